//! Order submission

use std::time::Duration;
use tracing::{debug, info};

use checkout_common::ChallengeChoice;

use super::three_ds::{handle_challenge, ChallengeResolution};
use super::StageContext;
use crate::config::ms;
use crate::driver::{LoadState, Locator, WaitState};
use crate::error::E2eResult;
use crate::wait::{act_awaiting, poll_until};

const ENABLED_POLL: Duration = Duration::from_millis(200);

/// The real "Place Order" button among decoys sharing its text
pub fn order_button(cx: &StageContext<'_>) -> Locator {
    let sel = &cx.selectors.order;
    Locator::css(&sel.place_order)
        .has_not_text(&sel.exclude_text)
        .nth(sel.place_order_index)
}

/// Wait for the checkout spinner to go away
pub async fn wait_for_loading_mask(cx: &StageContext<'_>) -> E2eResult<()> {
    cx.driver
        .wait_for(
            &Locator::css(&cx.selectors.order.loading_mask),
            WaitState::Hidden,
            ms(cx.timeouts.loading_mask_ms),
        )
        .await
}

/// Place an in-page order and answer the challenge that may follow
pub async fn place_order(
    cx: &StageContext<'_>,
    challenge: Option<ChallengeChoice>,
) -> E2eResult<ChallengeResolution> {
    let driver = cx.driver;
    let button = order_button(cx);
    let bound = ms(cx.timeouts.order_button_ms);

    driver.wait_for(&button, WaitState::Visible, bound).await?;
    poll_until("order button enabled", bound, ENABLED_POLL, || driver.is_enabled(&button)).await?;

    act_awaiting(
        driver.wait_for_load_state(LoadState::Load, ms(cx.timeouts.page_load_ms)),
        driver.click(&button, ms(cx.timeouts.element_ms)),
    )
    .await?;
    info!("Order placed");

    handle_challenge(cx, challenge).await
}

/// Place a redirect-flow order and wait for the external card form
pub async fn place_redirect_order(cx: &StageContext<'_>) -> E2eResult<()> {
    let button = Locator::css(&cx.selectors.order.redirect_place_order).first();
    cx.driver
        .wait_for(&button, WaitState::Visible, ms(cx.timeouts.order_button_ms))
        .await?;
    cx.driver.click(&button, ms(cx.timeouts.element_ms)).await?;
    debug!("Redirect order placed, waiting for card form");

    cx.driver
        .wait_for(
            &Locator::css(&cx.selectors.payment.redirect_form_ready).first(),
            WaitState::Visible,
            ms(cx.timeouts.redirect_form_ms),
        )
        .await?;
    info!("Redirect card form loaded");
    Ok(())
}
