//! Whole checkout runs against the scripted storefront, and the suite runner

mod common;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;

use checkout_common::{ChallengeChoice, CheckoutOutcome, Expectation, PaymentFlow, ShippingMethod};
use checkout_e2e::config::{CheckoutConfig, ShippingPolicy};
use checkout_e2e::driver::scripted::{Effect, Element, ScriptedDriver};
use checkout_e2e::driver::{Driver, FrameInfo};
use checkout_e2e::runner::{CaseStatus, Launcher};
use checkout_e2e::stages::ChallengeResolution;
use checkout_e2e::{CheckoutCase, CheckoutFlow, E2eError, E2eResult, FlowResult, SuiteRunner};
use common::{
    addresses, card, challenge_buttons, failure_message, on_place_order, on_redirect_next, scenario,
    show_success, storefront, Harness, ACS_URL, ORDER_REFERENCE, REDIRECT_FAILURE_TEXT,
};

/// The in-page order button, told apart from the redirect one by its filter
const PLACE_ORDER: &str = "[has-not-text=\"GooglePay\"]";

/// Storefront where placing an in-page order succeeds
fn accepting_storefront(config: &CheckoutConfig) -> ScriptedDriver {
    let driver = storefront(config);
    on_place_order(&driver, config, vec![show_success(config)]);
    driver
}

#[tokio::test(start_paused = true)]
async fn test_iframe_checkout_succeeds() {
    let h = Harness::new();
    let driver = accepting_storefront(&h.config);
    let case = CheckoutCase::new(scenario(), card(None), PaymentFlow::Iframe, addresses());
    let mut rng = StdRng::seed_from_u64(1);

    let report = CheckoutFlow::new(&h.config, &driver, &h.artifacts)
        .run(&case, &mut rng)
        .await
        .unwrap();

    assert_eq!(report.shipping.chosen_method, ShippingMethod::Standard);
    assert!(!report.billing_diverged);
    assert!(report.fields_valid);
    assert_eq!(report.challenge, ChallengeResolution::Skipped);
    assert_eq!(
        report.result,
        FlowResult::Placed {
            outcome: CheckoutOutcome::Success { order_reference: ORDER_REFERENCE.to_string() }
        }
    );
    let placed = driver.actions_on("click", PLACE_ORDER);
    assert_eq!(placed.len(), 1);
    assert!(placed[0].target.ends_with("nth=1"));
}

#[tokio::test(start_paused = true)]
async fn test_redirect_checkout_declined_challenge_fails_as_expected() {
    let h = Harness::new();
    let driver = storefront(&h.config);
    failure_message(&driver, &h.config, REDIRECT_FAILURE_TEXT);
    challenge_buttons(&driver, &h.config);
    on_redirect_next(
        &driver,
        &h.config,
        vec![Effect::AttachFrame(FrameInfo { name: "acs".to_string(), url: ACS_URL.to_string() })],
    );
    let case = CheckoutCase::new(
        scenario(),
        card(Some(ChallengeChoice::No)),
        PaymentFlow::Redirect,
        addresses(),
    );
    assert_eq!(case.expectation, Expectation::Failure);
    let mut rng = StdRng::seed_from_u64(1);

    let report = CheckoutFlow::new(&h.config, &driver, &h.artifacts)
        .run(&case, &mut rng)
        .await
        .unwrap();

    assert_eq!(report.challenge, ChallengeResolution::ClickedInFrame { frame_url: ACS_URL.to_string() });
    assert_eq!(
        report.result,
        FlowResult::Placed {
            outcome: CheckoutOutcome::Failure { reason_text: REDIRECT_FAILURE_TEXT.to_string() }
        }
    );
    assert_eq!(driver.actions_on("click", "button#no").len(), 1);
    assert!(driver.actions_on("click", PLACE_ORDER).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_rejected_card_fields_skip_the_order() {
    let mut h = Harness::new();
    let driver = accepting_storefront(&h.config);
    h.config.selectors.payment.validity_containers.push("#cc-zip".to_string());
    driver.add(Element::css("#cc-zip").attr("class", "field invalid"));
    let case = CheckoutCase::new(scenario(), card(None), PaymentFlow::Iframe, addresses());
    let mut rng = StdRng::seed_from_u64(1);

    let report = CheckoutFlow::new(&h.config, &driver, &h.artifacts)
        .run(&case, &mut rng)
        .await
        .unwrap();

    assert!(!report.fields_valid);
    assert_eq!(report.result, FlowResult::SkippedInvalidFields);
    assert!(driver.actions_on("click", PLACE_ORDER).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stage_failure_names_the_stage() {
    let mut config = common::config();
    config.policy.shipping_method = ShippingPolicy::Priced;
    let mut h = Harness::with_config(config);
    let driver = accepting_storefront(&h.config);
    h.config.selectors.shipping.next_page_price = "span.price.next".to_string();
    driver.add(Element::css("span.price.next").text("$9.99"));
    let case = CheckoutCase::new(scenario(), card(None), PaymentFlow::Iframe, addresses());
    let mut rng = StdRng::seed_from_u64(1);

    let err = CheckoutFlow::new(&h.config, &driver, &h.artifacts)
        .run(&case, &mut rng)
        .await
        .unwrap_err();

    assert_eq!(err.step(), Some("shipping price"));
    assert!(matches!(err.root(), E2eError::AssertionFailed(_)));
}

#[tokio::test(start_paused = true)]
async fn test_same_seed_same_choices() {
    let mut config = common::config();
    config.policy.shipping_method = ShippingPolicy::Random;
    let case = CheckoutCase::new(scenario(), card(None), PaymentFlow::Iframe, addresses());

    let mut methods = Vec::new();
    for _ in 0..2 {
        let h = Harness::with_config(config.clone());
        let driver = accepting_storefront(&h.config);
        let mut rng = StdRng::seed_from_u64(42);
        let report = CheckoutFlow::new(&h.config, &driver, &h.artifacts)
            .run(&case, &mut rng)
            .await
            .unwrap();
        methods.push(report.shipping);
    }

    assert_eq!(methods[0], methods[1]);
}

/// Opens an accepting storefront per case
struct ScriptedLauncher {
    config: CheckoutConfig,
}

#[async_trait]
impl Launcher for ScriptedLauncher {
    async fn launch(&self) -> E2eResult<Box<dyn Driver>> {
        Ok(Box::new(accepting_storefront(&self.config)))
    }
}

#[tokio::test(start_paused = true)]
async fn test_runner_writes_results_and_failure_screenshot() {
    let h = Harness::new();
    let mut declined = card(None);
    declined.label = "visa declined".to_string();
    declined.expect = Some(Expectation::Failure);
    let cases = vec![
        CheckoutCase::new(scenario(), card(None), PaymentFlow::Iframe, addresses()),
        CheckoutCase::new(scenario(), declined, PaymentFlow::Iframe, addresses()),
    ];

    let launcher = ScriptedLauncher { config: h.config.clone() };
    let runner = SuiteRunner::new(h.config.clone(), launcher).unwrap();
    let results = runner.run(cases, 11).await;

    assert_eq!((results.total, results.passed, results.failed), (2, 1, 1));
    assert!(!results.success());
    assert_eq!(results.results[0].status, CaseStatus::Passed);
    assert_eq!(results.results[0].seed, 11);

    let failed = &results.results[1];
    assert_eq!(failed.seed, 12);
    assert_eq!(failed.failed_step.as_deref(), Some("outcome"));
    assert!(failed.error.as_deref().unwrap_or_default().contains("expected failure, got success"));
    let shot = h.dir.path().join("screenshots").join("single_iframe_visa_declined.png");
    assert!(shot.exists());
    assert!(failed.attachments.iter().any(|a| a.path == shot));

    let path = runner.write_results(&results).unwrap();
    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(json["failed"], 1);
    assert_eq!(json["results"][0]["outcome"]["outcome"], "success");
}
