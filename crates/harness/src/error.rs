//! Error types for the harness

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    /// Raised inside route handlers when a mock or transform cannot be
    /// produced. Never escapes `RouteTable::dispatch`, which converts it
    /// into a passthrough disposition.
    #[error("Interception failed: {0}")]
    Interception(String),

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Unexpected status {status} from {endpoint}")]
    UnexpectedStatus { endpoint: String, status: u16 },

    #[error("Invalid route pattern: {0}")]
    InvalidPattern(String),

    #[error("Fixture error: {0}")]
    Fixture(String),

    #[error("Browser runner not found. Install with: npm install playwright")]
    RunnerNotFound,

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type HarnessResult<T> = Result<T, HarnessError>;
