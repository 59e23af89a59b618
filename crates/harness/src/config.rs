//! Harness configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::HarnessResult;

/// Harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Base URL of the application UI
    pub app_base_url: String,

    /// Base URL of the application API
    pub api_base_url: String,

    /// Base URL of the placeholder API used by pure API scenarios
    pub placeholder_base_url: String,

    /// Login credentials for the test user
    pub credentials: Credentials,

    /// Where the reusable storage-state snapshot is persisted
    pub storage_state_path: PathBuf,

    /// `localStorage` entry name holding the session token
    pub token_storage_key: String,

    /// Timeout for individual HTTP requests (milliseconds)
    pub request_timeout_ms: u64,

    /// Timeout for the post-login network signal (milliseconds)
    pub login_signal_timeout_ms: u64,

    /// Wall-clock bound for a full browser script run (milliseconds)
    pub script_timeout_ms: u64,

    /// Emit `>>` / `<<` console lines for every page request and response
    pub log_network: bool,
}

/// Test user credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            app_base_url: "https://conduit.bondaracademy.com".to_string(),
            api_base_url: "https://conduit-api.bondaracademy.com".to_string(),
            placeholder_base_url: "https://jsonplaceholder.typicode.com".to_string(),
            credentials: Credentials {
                email: "pwtest155@test.com".to_string(),
                password: "123456".to_string(),
            },
            storage_state_path: PathBuf::from(".auth/user.json"),
            token_storage_key: "jwtToken".to_string(),
            request_timeout_ms: 30_000,
            login_signal_timeout_ms: 2_000,
            script_timeout_ms: 90_000,
            log_network: false,
        }
    }
}

impl HarnessConfig {
    /// Load configuration from a TOML file, falling back to defaults when
    /// the file does not exist
    pub fn load(path: &Path) -> HarnessResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Override fields from the environment. Unset variables leave the
    /// current value in place.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("CONDUIT_APP_URL") {
            self.app_base_url = url;
        }
        if let Ok(url) = std::env::var("CONDUIT_API_URL") {
            self.api_base_url = url;
        }
        if let Ok(url) = std::env::var("CONDUIT_PLACEHOLDER_URL") {
            self.placeholder_base_url = url;
        }
        if let Ok(email) = std::env::var("CONDUIT_EMAIL") {
            self.credentials.email = email;
        }
        if let Ok(password) = std::env::var("CONDUIT_PASSWORD") {
            self.credentials.password = password;
        }
        if let Ok(path) = std::env::var("CONDUIT_STORAGE_STATE") {
            self.storage_state_path = PathBuf::from(path);
        }
    }

    /// Origin of the application UI, as recorded in storage-state snapshots
    pub fn app_origin(&self) -> String {
        self.app_base_url.trim_end_matches('/').to_string()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn login_signal_timeout(&self) -> Duration {
        Duration::from_millis(self.login_signal_timeout_ms)
    }

    pub fn script_timeout(&self) -> Duration {
        Duration::from_millis(self.script_timeout_ms)
    }
}
