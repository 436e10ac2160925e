//! Checkout orchestration
//!
//! Runs the stages in order for one case:
//!
//! ```text
//! cart -> checkout -> shipping (-> price check) -> payment method -> billing
//!   iframe:   fill card -> fields valid? -- no --> SkippedInvalidFields
//!                                        -- yes -> loading mask -> place order + 3DS -> outcome
//!   redirect: place order -> card form -> fill card -> 3DS -> outcome
//! ```

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use checkout_common::{
    AddressBook, CardFixture, CheckoutOutcome, Expectation, PaymentFlow, ProductScenario,
    ShippingSelection,
};

use crate::artifacts::CaseArtifacts;
use crate::config::CheckoutConfig;
use crate::driver::Driver;
use crate::error::E2eResult;
use crate::stages::{self, ChallengeResolution, StageContext};

/// One fully parameterised checkout run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutCase {
    pub title: String,
    pub scenario: ProductScenario,
    pub card: CardFixture,
    pub flow: PaymentFlow,
    pub addresses: AddressBook,
    pub expectation: Expectation,
}

impl CheckoutCase {
    pub fn new(scenario: ProductScenario, card: CardFixture, flow: PaymentFlow, addresses: AddressBook) -> Self {
        let title = format!("{} / {} / {}", scenario.label, flow, card.label);
        let expectation = card.expectation();
        Self { title, scenario, card, flow, addresses, expectation }
    }
}

/// How a case ended when no stage failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum FlowResult {
    Placed { outcome: CheckoutOutcome },
    /// Hosted card fields were rejected client side; no order was placed
    SkippedInvalidFields,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowReport {
    pub shipping: ShippingSelection,
    pub billing_diverged: bool,
    /// Always true for the redirect flow, which has no hosted fields
    pub fields_valid: bool,
    pub challenge: ChallengeResolution,
    pub result: FlowResult,
}

/// Drives one case through every stage against a driver
pub struct CheckoutFlow<'a> {
    config: &'a CheckoutConfig,
    driver: &'a dyn Driver,
    artifacts: &'a CaseArtifacts,
}

impl<'a> CheckoutFlow<'a> {
    pub fn new(config: &'a CheckoutConfig, driver: &'a dyn Driver, artifacts: &'a CaseArtifacts) -> Self {
        Self { config, driver, artifacts }
    }

    fn context(&self) -> StageContext<'a> {
        StageContext {
            driver: self.driver,
            selectors: &self.config.selectors,
            timeouts: &self.config.timeouts,
            messages: &self.config.messages,
            artifacts: self.artifacts,
        }
    }

    /// Run the case. Stage errors come back wrapped with the stage name.
    #[instrument(skip_all, fields(case = %case.title))]
    pub async fn run<R: Rng + Send + ?Sized>(&self, case: &CheckoutCase, rng: &mut R) -> E2eResult<FlowReport> {
        let cx = self.context();
        let policy = &self.config.policy;
        let addresses = &case.addresses;

        stages::build_cart(&cx, &case.scenario).await.map_err(|e| e.in_step("cart"))?;
        stages::proceed_to_checkout(&cx).await.map_err(|e| e.in_step("checkout navigation"))?;

        let shipping = stages::fill_shipping(&cx, &addresses.shipping, policy.shipping_method, rng)
            .await
            .map_err(|e| e.in_step("shipping"))?;
        stages::verify_shipping_price(&cx, &shipping)
            .await
            .map_err(|e| e.in_step("shipping price"))?;

        stages::select_payment_method(&cx, case.flow)
            .await
            .map_err(|e| e.in_step("payment method"))?;

        let billing = stages::apply_billing(&cx, &addresses.billing, policy.billing_divergence_probability, rng)
            .await
            .map_err(|e| e.in_step("billing"))?;
        stages::verify_billing_details(&cx, &addresses.shipping, &addresses.billing)
            .await
            .map_err(|e| e.in_step("billing verification"))?;

        let (fields_valid, challenge, result) = match case.flow {
            PaymentFlow::Iframe => self.run_iframe(&cx, case).await?,
            PaymentFlow::Redirect => self.run_redirect(&cx, case).await?,
        };

        Ok(FlowReport {
            shipping,
            billing_diverged: billing.diverged,
            fields_valid,
            challenge,
            result,
        })
    }

    async fn run_iframe(
        &self,
        cx: &StageContext<'_>,
        case: &CheckoutCase,
    ) -> E2eResult<(bool, ChallengeResolution, FlowResult)> {
        stages::wait_for_payment_frames_ready(cx)
            .await
            .map_err(|e| e.in_step("payment frames"))?;
        stages::fill_iframe_card(cx, &case.card)
            .await
            .map_err(|e| e.in_step("card entry"))?;

        if !stages::payment_fields_valid(cx).await {
            warn!("Card fields rejected for '{}', not placing an order", case.card.label);
            return Ok((false, ChallengeResolution::Skipped, FlowResult::SkippedInvalidFields));
        }

        stages::wait_for_loading_mask(cx)
            .await
            .map_err(|e| e.in_step("loading mask"))?;
        let challenge = stages::place_order(cx, case.card.challenge_choice)
            .await
            .map_err(|e| e.in_step("place order"))?;
        let outcome = stages::verify_outcome(cx, case.flow, case.expectation)
            .await
            .map_err(|e| e.in_step("outcome"))?;

        info!("Case finished with {}", outcome.kind());
        Ok((true, challenge, FlowResult::Placed { outcome }))
    }

    async fn run_redirect(
        &self,
        cx: &StageContext<'_>,
        case: &CheckoutCase,
    ) -> E2eResult<(bool, ChallengeResolution, FlowResult)> {
        stages::place_redirect_order(cx)
            .await
            .map_err(|e| e.in_step("place order"))?;
        stages::fill_redirect_card(cx, &case.card)
            .await
            .map_err(|e| e.in_step("card entry"))?;
        let challenge = stages::handle_challenge(cx, case.card.challenge_choice)
            .await
            .map_err(|e| e.in_step("challenge"))?;
        let outcome = stages::verify_outcome(cx, case.flow, case.expectation)
            .await
            .map_err(|e| e.in_step("outcome"))?;

        info!("Case finished with {}", outcome.kind());
        Ok((true, challenge, FlowResult::Placed { outcome }))
    }
}
