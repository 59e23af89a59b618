//! Session provisioning
//!
//! Both login strategies end in the same place: a bearer token plus a
//! storage-state snapshot a browser context can be seeded from. `UiLogin`
//! drives the real login form and captures whatever the app put in
//! browser storage; `DirectLogin` exchanges credentials over HTTP and
//! synthesizes an equivalent snapshot. Code downstream of `provision`
//! never needs to know which one ran.

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::api::ConduitClient;
use crate::config::HarnessConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::page::{PageConfig, PageHandle, PageStep};
use crate::storage::StorageState;

/// The product of a successful login
#[derive(Debug, Clone)]
pub struct SessionCredential {
    /// Bearer token for `Authorization: Token <jwt>` headers
    pub token: String,

    /// Browser storage snapshot carrying the same token, suitable for
    /// seeding a page context
    pub storage: StorageState,
}

/// A way of turning credentials into a session
#[async_trait]
pub trait LoginStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn acquire(&self, config: &HarnessConfig) -> HarnessResult<SessionCredential>;
}

/// Log in by calling the authentication endpoint directly, no browser
/// involved
pub struct DirectLogin;

#[async_trait]
impl LoginStrategy for DirectLogin {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn acquire(&self, config: &HarnessConfig) -> HarnessResult<SessionCredential> {
        let mut client = ConduitClient::from_config(config)?;
        let user = client
            .login(&config.credentials.email, &config.credentials.password)
            .await?;

        let mut storage = StorageState::default();
        storage.set_token(&config.app_origin(), &config.token_storage_key, &user.token);
        Ok(SessionCredential {
            token: user.token,
            storage,
        })
    }
}

/// Log in by driving the login form in a real browser, then reading the
/// token back out of the captured storage state.
///
/// The page run defaults to browser settings derived from the harness
/// config; `with_page_config` lets a caller thread its own browser,
/// headless mode, and viewport through the login run instead.
#[derive(Default)]
pub struct UiLogin {
    page: Option<PageConfig>,
}

impl UiLogin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_config(page: PageConfig) -> Self {
        Self { page: Some(page) }
    }

    fn page_config(&self, config: &HarnessConfig) -> PageConfig {
        self.page
            .clone()
            .unwrap_or_else(|| PageConfig::from_config(config))
    }
}

#[async_trait]
impl LoginStrategy for UiLogin {
    fn name(&self) -> &'static str {
        "ui"
    }

    async fn acquire(&self, config: &HarnessConfig) -> HarnessResult<SessionCredential> {
        let workdir = tempfile::tempdir()?;
        let snapshot = workdir.path().join("storage-state.json");

        let steps = login_steps(config);
        let page = PageHandle::new(self.page_config(config)).save_storage_state(&snapshot);
        page.run(&steps).await?;

        let storage = StorageState::load(&snapshot)?;
        let token = storage
            .token(&config.app_origin(), &config.token_storage_key)
            .ok_or_else(|| {
                HarnessError::Authentication(
                    "login finished but no token appeared in browser storage".to_string(),
                )
            })?
            .to_string();
        debug!("captured storage state from browser login");

        Ok(SessionCredential { token, storage })
    }
}

/// The form interaction sequence for the hosted login page.
///
/// The tags request fires once the app has accepted the login and
/// re-rendered the feed, so it doubles as the completion signal. If it
/// never arrives within the bound the run fails with a timeout rather
/// than hanging.
fn login_steps(config: &HarnessConfig) -> Vec<PageStep> {
    vec![
        PageStep::Navigate { path: "/".into() },
        PageStep::Sleep { ms: 500 },
        PageStep::ClickText {
            text: "Sign in".into(),
            nth: None,
        },
        PageStep::FillRole {
            role: "textbox".into(),
            name: "Email".into(),
            value: config.credentials.email.clone(),
        },
        PageStep::FillRole {
            role: "textbox".into(),
            name: "Password".into(),
            value: config.credentials.password.clone(),
        },
        PageStep::ClickRole {
            role: "button".into(),
            name: "Sign in".into(),
            nth: None,
        },
        PageStep::WaitResponse {
            pattern: "**/api/tags".into(),
            timeout_ms: config.login_signal_timeout_ms,
            capture: None,
        },
    ]
}

/// Runs a login strategy and persists the result for later runs.
///
/// Persistence is read-modify-write on the snapshot file and is not
/// atomic across processes; callers that provision concurrently must
/// serialize around it.
pub struct SessionProvisioner {
    config: HarnessConfig,
}

impl SessionProvisioner {
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Acquire a fresh session without touching the snapshot file.
    pub async fn provision(
        &self,
        strategy: &dyn LoginStrategy,
    ) -> HarnessResult<SessionCredential> {
        let credential = strategy.acquire(&self.config).await?;
        info!("provisioned session via {} login", strategy.name());
        Ok(credential)
    }

    /// Acquire a session and persist it to `path`. If a snapshot already
    /// exists there, only its token entry is rewritten; cookies and
    /// unrelated storage entries survive. A missing file is seeded with
    /// the full acquired snapshot.
    pub async fn provision_into(
        &self,
        strategy: &dyn LoginStrategy,
        path: &Path,
    ) -> HarnessResult<SessionCredential> {
        let credential = self.provision(strategy).await?;

        let mut snapshot = if path.exists() {
            StorageState::load(path)?
        } else {
            credential.storage.clone()
        };
        snapshot.set_token(
            &self.config.app_origin(),
            &self.config.token_storage_key,
            &credential.token,
        );
        snapshot.save(path)?;
        debug!("session snapshot written to {}", path.display());

        Ok(credential)
    }

    /// `provision_into` at the configured snapshot location.
    pub async fn provision_persistent(
        &self,
        strategy: &dyn LoginStrategy,
    ) -> HarnessResult<SessionCredential> {
        let path = self.config.storage_state_path.clone();
        self.provision_into(strategy, &path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{OriginState, StorageEntry};
    use serde_json::json;

    struct FixedToken(&'static str);

    #[async_trait]
    impl LoginStrategy for FixedToken {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn acquire(&self, config: &HarnessConfig) -> HarnessResult<SessionCredential> {
            let mut storage = StorageState::default();
            storage.set_token(&config.app_origin(), &config.token_storage_key, self.0);
            Ok(SessionCredential {
                token: self.0.to_string(),
                storage,
            })
        }
    }

    fn config_with_snapshot(dir: &Path) -> HarnessConfig {
        HarnessConfig {
            storage_state_path: dir.join("user.json"),
            ..HarnessConfig::default()
        }
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_seeded_from_strategy() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_snapshot(dir.path());
        let provisioner = SessionProvisioner::new(config.clone());

        let credential = provisioner
            .provision_persistent(&FixedToken("jwt-one"))
            .await
            .unwrap();
        assert_eq!(credential.token, "jwt-one");

        let saved = StorageState::load(&config.storage_state_path).unwrap();
        assert_eq!(
            saved.token(&config.app_origin(), &config.token_storage_key),
            Some("jwt-one")
        );
    }

    #[tokio::test]
    async fn test_reprovision_updates_token_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_snapshot(dir.path());
        let origin = config.app_origin();

        // Seed a snapshot carrying state the provisioner must not disturb.
        let mut existing = StorageState::default();
        existing.cookies.push(json!({"name": "session", "value": "abc"}));
        existing.origins.push(OriginState {
            origin: origin.clone(),
            local_storage: vec![
                StorageEntry {
                    name: "theme".into(),
                    value: "dark".into(),
                },
                StorageEntry {
                    name: config.token_storage_key.clone(),
                    value: "stale-jwt".into(),
                },
            ],
            extra: Default::default(),
        });
        existing.save(&config.storage_state_path).unwrap();

        let provisioner = SessionProvisioner::new(config.clone());
        provisioner
            .provision_persistent(&FixedToken("fresh-jwt"))
            .await
            .unwrap();

        let saved = StorageState::load(&config.storage_state_path).unwrap();
        assert_eq!(saved.cookies.len(), 1);
        let entries = &saved.origins[0].local_storage;
        assert_eq!(entries.len(), 2, "token must be overwritten, not appended");
        assert_eq!(entries[0].value, "dark");
        assert_eq!(
            saved.token(&origin, &config.token_storage_key),
            Some("fresh-jwt")
        );
    }

    #[tokio::test]
    async fn test_two_provisions_leave_a_single_token_entry() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_snapshot(dir.path());
        let provisioner = SessionProvisioner::new(config.clone());

        provisioner
            .provision_persistent(&FixedToken("first"))
            .await
            .unwrap();
        provisioner
            .provision_persistent(&FixedToken("second"))
            .await
            .unwrap();

        let saved = StorageState::load(&config.storage_state_path).unwrap();
        let entries = &saved.origins[0].local_storage;
        let token_entries: Vec<_> = entries
            .iter()
            .filter(|e| e.name == config.token_storage_key)
            .collect();
        assert_eq!(token_entries.len(), 1);
        assert_eq!(token_entries[0].value, "second");
    }

    #[test]
    fn test_login_steps_fill_credentials_and_submit() {
        let config = HarnessConfig::default();
        let steps = login_steps(&config);

        let submit = steps.iter().find_map(|step| match step {
            PageStep::ClickRole { role, name, nth } => {
                Some((role.as_str(), name.as_str(), *nth))
            }
            _ => None,
        });
        assert_eq!(submit, Some(("button", "Sign in", None)));

        let fills: Vec<_> = steps
            .iter()
            .filter_map(|step| match step {
                PageStep::FillRole { name, value, .. } => {
                    Some((name.as_str(), value.as_str()))
                }
                _ => None,
            })
            .collect();
        assert_eq!(
            fills,
            vec![
                ("Email", config.credentials.email.as_str()),
                ("Password", config.credentials.password.as_str()),
            ]
        );

        match steps.last() {
            Some(PageStep::WaitResponse { pattern, .. }) => {
                assert_eq!(pattern.as_str(), "**/api/tags");
            }
            other => panic!("login must end waiting on the feed signal, got {other:?}"),
        }
    }

    #[test]
    fn test_ui_login_honors_caller_page_config() {
        use crate::page::Browser;

        let config = HarnessConfig::default();

        let mut page = PageConfig::from_config(&config);
        page.browser = Browser::Firefox;
        page.headless = false;
        page.viewport_width = 1600;

        let threaded = UiLogin::with_page_config(page).page_config(&config);
        assert_eq!(threaded.browser, Browser::Firefox);
        assert!(!threaded.headless);
        assert_eq!(threaded.viewport_width, 1600);

        let derived = UiLogin::new().page_config(&config);
        assert_eq!(derived.browser, Browser::Chromium);
        assert_eq!(derived.base_url, config.app_origin());
    }
}
