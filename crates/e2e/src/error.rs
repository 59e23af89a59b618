//! Error types for the scenario runner

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Scenario parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Scenario not found: {0}")]
    NotFound(String),

    #[error("Invalid scenario: {0}")]
    Invalid(String),

    #[error(transparent)]
    Harness(#[from] conduit_harness::HarnessError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;
