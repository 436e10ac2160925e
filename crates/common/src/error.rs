//! Error types for fixture handling

use thiserror::Error;

/// Result type alias using FixtureError
pub type Result<T> = std::result::Result<T, FixtureError>;

/// Fixture loading and validation errors
#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unsupported fixture format: {0}")]
    UnsupportedFormat(String),

    #[error("Fixture not found: {0}")]
    NotFound(String),

    #[error("Invalid fixture: {0}")]
    Invalid(String),
}
