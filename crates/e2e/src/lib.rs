//! Checkout E2E
//!
//! Drives a storefront's checkout in a real browser and verifies the payment
//! outcome:
//! - Builds a cart and walks shipping, billing and payment
//! - Fills hosted (iframe) or redirect card forms
//! - Answers 3-D Secure challenges
//! - Races the success and failure messages and checks their wording
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      SuiteRunner                            │
//! │    build_cases(fixtures) -> [CheckoutCase]                  │
//! │    run_case(case) -> CaseResult  (one page per case)        │
//! ├─────────────────────────────────────────────────────────────┤
//! │                      CheckoutFlow                           │
//! │    cart -> navigator -> shipping -> payment -> billing      │
//! │    -> validator -> submit -> three_ds -> outcome            │
//! ├─────────────────────────────────────────────────────────────┤
//! │                  Driver (async trait)                       │
//! │    PlaywrightSession   node bridge, JSON lines              │
//! │    ScriptedDriver      in-memory page for tests             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod artifacts;
pub mod config;
pub mod driver;
pub mod error;
pub mod flow;
pub mod playwright;
pub mod runner;
pub mod stages;
pub mod storefront;
pub mod wait;

pub use config::CheckoutConfig;
pub use driver::{Driver, Locator};
pub use error::{E2eError, E2eResult};
pub use flow::{CheckoutCase, CheckoutFlow, FlowReport, FlowResult};
pub use runner::{SuiteResult, SuiteRunner};
