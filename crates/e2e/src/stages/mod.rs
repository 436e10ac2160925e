//! Checkout stages
//!
//! Each stage is a free async function over a [`StageContext`]. Stages never
//! retry on their own except where noted (checkout click fallback, challenge
//! frame retry); every other failure propagates to the flow.

use crate::artifacts::CaseArtifacts;
use crate::config::{Messages, Selectors, Timeouts};
use crate::driver::Driver;

pub mod billing;
pub mod cart;
pub mod navigator;
pub mod outcome;
pub mod payment;
pub mod shipping;
pub mod submit;
pub mod three_ds;
pub mod validator;

pub use billing::{apply_billing, verify_billing_details, BillingDecision};
pub use cart::build_cart;
pub use navigator::proceed_to_checkout;
pub use outcome::verify_outcome;
pub use payment::{
    fill_iframe_card, fill_redirect_card, select_payment_method, wait_for_payment_frames_ready,
};
pub use shipping::{fill_shipping, verify_shipping_price};
pub use submit::{place_order, place_redirect_order, wait_for_loading_mask};
pub use three_ds::{handle_challenge, ChallengeResolution};
pub use validator::payment_fields_valid;

/// Everything a stage needs from the running case
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    pub driver: &'a dyn Driver,
    pub selectors: &'a Selectors,
    pub timeouts: &'a Timeouts,
    pub messages: &'a Messages,
    pub artifacts: &'a CaseArtifacts,
}
