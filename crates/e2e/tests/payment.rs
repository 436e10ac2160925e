//! Payment method selection, card entry and hosted field validity

mod common;

use checkout_common::PaymentFlow;
use checkout_e2e::driver::scripted::{Element, ScriptedDriver};
use checkout_e2e::driver::Locator;
use checkout_e2e::stages::{
    fill_iframe_card, fill_redirect_card, payment_fields_valid, select_payment_method,
    wait_for_payment_frames_ready,
};
use checkout_e2e::E2eError;
use common::{card, storefront, Harness};

#[tokio::test(start_paused = true)]
async fn test_select_method_clicks_matching_label() {
    let h = Harness::new();
    let driver = storefront(&h.config);
    let cx = h.context(&driver);
    let p = &h.config.selectors.payment;

    select_payment_method(&cx, PaymentFlow::Redirect).await.unwrap();

    assert_eq!(driver.actions_on("click", &p.redirect_method_label).len(), 1);
    assert!(driver.actions_on("click", &p.iframe_method_label).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_iframe_card_fills_frames_and_tabs_out() {
    let h = Harness::new();
    let driver = storefront(&h.config);
    let cx = h.context(&driver);
    let p = &h.config.selectors.payment;
    let card = card(None);

    wait_for_payment_frames_ready(&cx).await.unwrap();
    fill_iframe_card(&cx, &card).await.unwrap();

    let framed = |field: &checkout_e2e::config::FramedInput| {
        Locator::css(&field.input).in_frame(&field.frame)
    };
    assert_eq!(driver.value_of(&framed(&p.name_field)).as_deref(), Some("Ada Lovelace"));
    assert_eq!(driver.value_of(&framed(&p.card_field)).as_deref(), Some("4111111111111111"));
    assert_eq!(driver.value_of(&framed(&p.expiry_field)).as_deref(), Some("0829"));
    assert_eq!(driver.value_of(&framed(&p.cvv_field)).as_deref(), Some("123"));

    let presses = driver.actions_on("press", &p.cvv_field.frame);
    assert_eq!(presses.len(), 1);
    assert_eq!(presses[0].value.as_deref(), Some("Tab"));
}

#[tokio::test(start_paused = true)]
async fn test_missing_payment_frame_times_out() {
    let h = Harness::new();
    let driver = ScriptedDriver::new();
    let p = &h.config.selectors.payment;
    for field in [&p.name_field, &p.card_field, &p.expiry_field] {
        driver.add(Element::css(&field.input).in_frame(&field.frame));
    }

    let err = wait_for_payment_frames_ready(&h.context(&driver)).await.unwrap_err();
    assert!(matches!(err, E2eError::Timeout(msg) if msg.contains(&p.cvv_field.frame)));
}

#[tokio::test(start_paused = true)]
async fn test_redirect_card_picks_brand_and_splits_expiry() {
    let h = Harness::new();
    let driver = storefront(&h.config);
    let p = &h.config.selectors.payment;

    fill_redirect_card(&h.context(&driver), &card(None)).await.unwrap();

    assert_eq!(driver.actions_on("click", "[has-text=\"VISA\"]").len(), 1);
    assert!(driver.actions_on("click", "MASTERCARD").is_empty());
    assert_eq!(driver.value_of(&Locator::css(&p.card_number)).as_deref(), Some("4111111111111111"));
    assert_eq!(driver.value_of(&Locator::css(&p.expiry_month)).as_deref(), Some("08"));
    assert_eq!(driver.value_of(&Locator::css(&p.expiry_year)).as_deref(), Some("2029"));

    let typed = driver.actions_on("type", &p.cvv);
    assert_eq!(typed.len(), 1);
    assert_eq!(typed[0].value.as_deref(), Some("123"));
    assert!(driver.actions_on("fill", &p.cvv).is_empty());
    assert_eq!(driver.actions_on("click", &p.next_button).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_redirect_card_with_named_brand() {
    let h = Harness::new();
    let driver = storefront(&h.config);
    let mut card = card(None);
    card.brand = Some("MASTERCARD".to_string());

    fill_redirect_card(&h.context(&driver), &card).await.unwrap();

    assert_eq!(driver.actions_on("click", "[has-text=\"MASTERCARD\"]").len(), 1);
}

#[tokio::test]
async fn test_redirect_card_rejects_bad_expiry_before_typing() {
    let h = Harness::new();
    let driver = storefront(&h.config);
    let mut card = card(None);
    card.expiry = "13/29".to_string();

    let err = fill_redirect_card(&h.context(&driver), &card).await.unwrap_err();

    assert!(matches!(err, E2eError::Fixture(_)));
    assert!(driver.actions().is_empty());
}

#[tokio::test]
async fn test_fields_valid_is_a_pure_read() {
    let h = Harness::new();
    let driver = storefront(&h.config);
    let cx = h.context(&driver);

    assert!(payment_fields_valid(&cx).await);
    assert!(payment_fields_valid(&cx).await);
    assert!(driver.actions().is_empty());
}

#[tokio::test]
async fn test_one_invalid_container_fails_validation() {
    let h = Harness::new();
    let driver = ScriptedDriver::new();
    let containers = &h.config.selectors.payment.validity_containers;
    for (i, container) in containers.iter().enumerate() {
        let class = if i == 2 { "field invalid" } else { "field valid" };
        driver.add(Element::css(container).attr("class", class));
    }
    let cx = h.context(&driver);

    assert!(!payment_fields_valid(&cx).await);
    assert!(!payment_fields_valid(&cx).await);
}

#[tokio::test]
async fn test_missing_container_counts_as_invalid() {
    let h = Harness::new();
    let driver = ScriptedDriver::new();
    driver.add(Element::css(&h.config.selectors.payment.validity_containers[0]).attr("class", "valid"));

    assert!(!payment_fields_valid(&h.context(&driver)).await);
}
