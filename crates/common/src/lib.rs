//! Checkout E2E Common Library
//!
//! Fixture data model shared by the checkout suite: addresses, cards, product
//! scenarios and the transient values produced while a checkout runs.

pub mod country;
pub mod error;
pub mod fixtures;
pub mod types;

// Re-export commonly used types
pub use error::{FixtureError, Result};
pub use fixtures::Fixtures;
pub use types::*;

/// Suite version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default fixtures directory, relative to the workspace root
pub fn default_fixtures_dir() -> std::path::PathBuf {
    std::path::PathBuf::from("fixtures")
}
