//! Error types for the checkout suite

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Playwright not found. Install with: npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright bridge failed to start: {0}")]
    BridgeStartup(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Element not found: {0}")]
    NotFound(String),

    #[error("Frame detached: {0}")]
    FrameDetached(String),

    #[error("Neither terminal message appeared: {0}")]
    NoTerminalMessage(String),

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Outcome mismatch: expected {expected}, got {actual}")]
    OutcomeMismatch { expected: String, actual: String },

    #[error("Step failed: {step} - {source}")]
    StepFailed {
        step: String,
        #[source]
        source: Box<E2eError>,
    },

    #[error("Storefront health check failed after {0} attempts")]
    StorefrontUnreachable(usize),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Fixture error: {0}")]
    Fixture(#[from] checkout_common::FixtureError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl E2eError {
    /// Wrap an error with the stage that raised it
    pub fn in_step(self, step: &str) -> Self {
        match self {
            E2eError::StepFailed { .. } => self,
            other => E2eError::StepFailed {
                step: step.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// The error underneath any step wrapping
    pub fn root(&self) -> &E2eError {
        match self {
            E2eError::StepFailed { source, .. } => source.root(),
            other => other,
        }
    }

    /// Stage name for errors raised inside a step
    pub fn step(&self) -> Option<&str> {
        match self {
            E2eError::StepFailed { step, .. } => Some(step),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, E2eError::Timeout(_) | E2eError::NotFound(_))
    }

    pub fn is_detached(&self) -> bool {
        matches!(self, E2eError::FrameDetached(_))
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
