//! Declarative YAML scenario specification

use serde::{Deserialize, Serialize};
use std::path::Path;

use conduit_harness::page::PageStep;
use conduit_harness::route::{FieldOverwrite, InterceptMode, RouteTable};
use conduit_harness::FixtureStore;

use crate::error::{E2eError, E2eResult};

/// A complete scenario parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    /// Unique name for this scenario
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering scenarios
    #[serde(default)]
    pub tags: Vec<String>,

    /// Viewport size for the browser
    #[serde(default = "default_viewport")]
    pub viewport: Viewport,

    /// Whether and how to provision a session before driving the page
    #[serde(default)]
    pub session: SessionMode,

    /// Interception rules registered before the first navigation
    #[serde(default)]
    pub routes: Vec<RouteSpec>,

    /// API-side preparation, run before the browser starts
    #[serde(default)]
    pub setup: Vec<SetupAction>,

    /// Steps to execute in order
    pub steps: Vec<PageStep>,

    /// API-side teardown, run after the steps even when they fail
    #[serde(default)]
    pub cleanup: Vec<CleanupAction>,
}

fn default_viewport() -> Viewport {
    Viewport {
        width: 1280,
        height: 720,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Anonymous page, no credentials
    #[default]
    None,

    /// Provision by calling the login endpoint
    Direct,

    /// Provision by driving the login form
    Ui,
}

/// One interception rule. Exactly one of `mock` or `transform` must be
/// present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSpec {
    pub pattern: String,

    #[serde(default)]
    pub mock: Option<MockSpec>,

    #[serde(default)]
    pub transform: Option<Vec<FieldOverwrite>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockSpec {
    /// Name of the fixture payload to respond with
    pub fixture: String,

    #[serde(default = "default_mock_status")]
    pub status: u16,
}

fn default_mock_status() -> u16 {
    200
}

/// Preparation performed over the API before the page opens
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SetupAction {
    /// Create an article as the provisioned user; its slug is remembered
    /// for `delete_created_articles`
    CreateArticle {
        title: String,
        description: String,
        body: String,
        #[serde(default)]
        tag_list: Vec<String>,
    },
}

/// Teardown performed over the API after the steps
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CleanupAction {
    /// Delete every article created by `setup`
    DeleteCreatedArticles,

    /// Delete the article whose creation response was captured by a
    /// `wait_response` step; the slug is read from the captured body
    DeleteCapturedArticle { capture: String },
}

impl RouteSpec {
    /// Resolve this rule against the fixture store.
    pub fn mode(&self, fixtures: &FixtureStore) -> E2eResult<InterceptMode> {
        match (&self.mock, &self.transform) {
            (Some(mock), None) => Ok(InterceptMode::Mock {
                status: mock.status,
                body: fixtures.get_owned(&mock.fixture)?,
            }),
            (None, Some(overwrites)) => Ok(InterceptMode::Transform {
                overwrites: overwrites.clone(),
            }),
            _ => Err(E2eError::Invalid(format!(
                "route {} must define exactly one of mock or transform",
                self.pattern
            ))),
        }
    }
}

impl ScenarioSpec {
    /// Parse a scenario from a YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parse a scenario from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load all scenarios from a directory
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut specs = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            let spec = Self::from_file(entry.path())?;
            specs.push(spec);
        }

        Ok(specs)
    }

    /// Compile the route specs into an interception table, in file order
    /// so later entries shadow earlier ones.
    pub fn route_table(&self, fixtures: &FixtureStore) -> E2eResult<RouteTable> {
        let mut table = RouteTable::new();
        for route in &self.routes {
            table.intercept(&route.pattern, route.mode(fixtures)?)?;
        }
        Ok(table)
    }

    pub fn needs_session(&self) -> bool {
        self.session != SessionMode::None
            || !self.setup.is_empty()
            || !self.cleanup.is_empty()
    }
}
