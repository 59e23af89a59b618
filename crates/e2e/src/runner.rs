//! Scenario runner orchestrating sessions, interception, and the browser

use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use conduit_harness::api::{ArticleDraft, ConduitClient};
use conduit_harness::page::{CapturedResponse, PageConfig, PageHandle, PageRun, StepReport};
use conduit_harness::session::{
    DirectLogin, LoginStrategy, SessionCredential, SessionProvisioner, UiLogin,
};
use conduit_harness::{FixtureStore, HarnessConfig, HarnessResult};

use crate::error::{E2eError, E2eResult};
use crate::scenario::{CleanupAction, ScenarioSpec, SessionMode, SetupAction};

/// Result of running a single scenario.
///
/// `steps` holds the browser steps that completed, in order. When the
/// page run fails the failing step's label is folded into `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub success: bool,
    pub duration_ms: u64,
    pub steps: Vec<StepReport>,
    pub error: Option<String>,
}

/// Result of running a suite of scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub generated_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

/// Main scenario runner.
///
/// A session is provisioned at most once per runner and reused by every
/// scenario that asks for one; the first such scenario decides the
/// strategy. Both strategies produce interchangeable credentials, so
/// later scenarios are indifferent to which one ran.
pub struct ScenarioRunner {
    harness_config: HarnessConfig,
    page_config: PageConfig,
    specs_dir: PathBuf,
    fixtures_dir: PathBuf,
    output_dir: PathBuf,
    fixtures: Option<FixtureStore>,
    session: Option<SessionCredential>,
}

impl ScenarioRunner {
    /// Create a runner with default configuration
    pub fn new() -> Self {
        Self::with_config(RunnerConfig::default())
    }

    /// Create a runner with custom configuration
    pub fn with_config(config: RunnerConfig) -> Self {
        Self {
            page_config: config.page,
            harness_config: config.harness,
            specs_dir: config.specs_dir,
            fixtures_dir: config.fixtures_dir,
            output_dir: config.output_dir,
            fixtures: None,
            session: None,
        }
    }

    /// Run all scenarios in the specs directory
    pub async fn run_all(&mut self) -> E2eResult<SuiteResult> {
        let specs = ScenarioSpec::load_all(&self.specs_dir)?;
        self.run_specs(&specs).await
    }

    /// Run scenarios matching a tag
    pub async fn run_tagged(&mut self, tag: &str) -> E2eResult<SuiteResult> {
        let specs = ScenarioSpec::load_all(&self.specs_dir)?;
        let filtered: Vec<ScenarioSpec> = specs
            .into_iter()
            .filter(|s| s.tags.contains(&tag.to_string()))
            .collect();
        self.run_specs(&filtered).await
    }

    /// Run a specific scenario by name
    pub async fn run_scenario(&mut self, name: &str) -> E2eResult<ScenarioResult> {
        let specs = ScenarioSpec::load_all(&self.specs_dir)?;
        let spec = specs
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| E2eError::NotFound(name.to_string()))?;

        self.run_spec(&spec).await
    }

    /// Run a list of scenarios
    pub async fn run_specs(&mut self, specs: &[ScenarioSpec]) -> E2eResult<SuiteResult> {
        let start = Instant::now();
        let mut results = Vec::new();
        let mut passed = 0;
        let mut failed = 0;
        let skipped = 0;

        info!("Running {} scenario(s)...", specs.len());

        for spec in specs {
            match self.run_spec(spec).await {
                Ok(result) => {
                    if result.success {
                        passed += 1;
                        info!("✓ {} ({} ms)", result.name, result.duration_ms);
                    } else {
                        failed += 1;
                        error!(
                            "✗ {} - {}",
                            result.name,
                            result.error.as_deref().unwrap_or("unknown error")
                        );
                    }
                    results.push(result);
                }
                Err(e) => {
                    failed += 1;
                    error!("✗ {} - {}", spec.name, e);
                    results.push(ScenarioResult {
                        name: spec.name.clone(),
                        success: false,
                        duration_ms: 0,
                        steps: Vec::new(),
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;

        info!("");
        info!(
            "Scenario Results: {} passed, {} failed, {} skipped ({} ms)",
            passed, failed, skipped, duration_ms
        );

        Ok(SuiteResult {
            generated_at: Utc::now(),
            total: specs.len(),
            passed,
            failed,
            skipped,
            duration_ms,
            results,
        })
    }

    /// Run a single scenario: setup over the API, drive the page, then
    /// clean up even when the steps failed.
    pub async fn run_spec(&mut self, spec: &ScenarioSpec) -> E2eResult<ScenarioResult> {
        let start = Instant::now();
        debug!("Running scenario: {}", spec.name);

        let fixtures = self.fixtures()?;
        let routes = spec.route_table(fixtures)?;

        let client = if spec.needs_session() {
            let credential = self.ensure_session(spec.session).await?;
            let mut client = ConduitClient::from_config(&self.harness_config)?;
            client.set_token(&credential.token);
            Some(client)
        } else {
            None
        };

        let mut created_slugs: Vec<String> = Vec::new();
        let mut scenario_error: Option<String> = None;

        if let Some(client) = &client {
            for action in &spec.setup {
                if let Err(e) = self.run_setup(client, action, &mut created_slugs).await {
                    scenario_error = Some(format!("setup failed: {e}"));
                    break;
                }
            }
        }

        let mut run = PageRun::default();
        if scenario_error.is_none() {
            let mut page_config = self.page_config.clone();
            page_config.viewport_width = spec.viewport.width;
            page_config.viewport_height = spec.viewport.height;
            let mut page = PageHandle::new(page_config).with_routes(routes);
            if spec.session != SessionMode::None {
                page = page.load_storage_state(&self.harness_config.storage_state_path);
            }
            match page.run(&spec.steps).await {
                Ok(outcome) => run = outcome,
                Err(e) => scenario_error = Some(e.to_string()),
            }
        }

        if let Some(client) = &client {
            for action in &spec.cleanup {
                if let Err(e) = self.run_cleanup(client, action, &created_slugs, &run).await {
                    warn!("cleanup action failed for {}: {}", spec.name, e);
                    scenario_error.get_or_insert(format!("cleanup failed: {e}"));
                }
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        let success = scenario_error.is_none();

        Ok(ScenarioResult {
            name: spec.name.clone(),
            success,
            duration_ms,
            steps: run.steps,
            error: scenario_error,
        })
    }

    async fn run_setup(
        &self,
        client: &ConduitClient,
        action: &SetupAction,
        created_slugs: &mut Vec<String>,
    ) -> HarnessResult<()> {
        match action {
            SetupAction::CreateArticle {
                title,
                description,
                body,
                tag_list,
            } => {
                let article = client
                    .create_article(&ArticleDraft {
                        title: title.clone(),
                        description: description.clone(),
                        body: body.clone(),
                        tag_list: tag_list.clone(),
                    })
                    .await?;
                debug!("setup created article {}", article.slug);
                created_slugs.push(article.slug);
                Ok(())
            }
        }
    }

    async fn run_cleanup(
        &self,
        client: &ConduitClient,
        action: &CleanupAction,
        created_slugs: &[String],
        run: &PageRun,
    ) -> E2eResult<()> {
        match action {
            CleanupAction::DeleteCreatedArticles => {
                for slug in created_slugs {
                    client.delete_article(slug).await?;
                    debug!("cleanup deleted article {slug}");
                }
                Ok(())
            }
            CleanupAction::DeleteCapturedArticle { capture } => {
                let response = run.captures.get(capture).ok_or_else(|| {
                    E2eError::Invalid(format!("no captured response named {capture}"))
                })?;
                let slug = captured_slug(response)
                    .ok_or_else(|| E2eError::Invalid(format!("capture {capture} has no slug")))?;
                client.delete_article(&slug).await?;
                debug!("cleanup deleted captured article {slug}");
                Ok(())
            }
        }
    }

    async fn ensure_session(&mut self, mode: SessionMode) -> E2eResult<SessionCredential> {
        if let Some(credential) = &self.session {
            return Ok(credential.clone());
        }

        // A UI login drives a real page, so it must honor the same browser
        // settings the scenarios run under.
        let ui = UiLogin::with_page_config(self.page_config.clone());
        let strategy: &dyn LoginStrategy = match mode {
            SessionMode::Ui => &ui,
            _ => &DirectLogin,
        };
        let provisioner = SessionProvisioner::new(self.harness_config.clone());
        let credential = provisioner.provision_persistent(strategy).await?;
        self.session = Some(credential.clone());
        Ok(credential)
    }

    fn fixtures(&mut self) -> E2eResult<&FixtureStore> {
        if self.fixtures.is_none() {
            let store = if self.fixtures_dir.exists() {
                FixtureStore::load(&self.fixtures_dir)?
            } else {
                debug!(
                    "no fixture directory at {}, starting empty",
                    self.fixtures_dir.display()
                );
                FixtureStore::empty()
            };
            self.fixtures = Some(store);
        }
        Ok(self.fixtures.get_or_insert_with(FixtureStore::empty))
    }

    /// Write suite results to a JSON file
    pub fn write_results(&self, results: &SuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;

        let path = self.output_dir.join("scenario-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

impl Default for ScenarioRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// Article creation responses carry the slug at `article.slug`.
fn captured_slug(response: &CapturedResponse) -> Option<String> {
    let body: Value = response.json().ok()?;
    body.pointer("/article/slug")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Configuration for the scenario runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub harness: HarnessConfig,
    pub page: PageConfig,
    pub specs_dir: PathBuf,
    pub fixtures_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        let harness = HarnessConfig::default();
        let page = PageConfig::from_config(&harness);
        Self {
            harness,
            page,
            specs_dir: PathBuf::from("tests/specs"),
            fixtures_dir: PathBuf::from("tests/fixtures"),
            output_dir: PathBuf::from("test-results"),
        }
    }
}
