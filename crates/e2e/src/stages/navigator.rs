//! Cart to checkout transition

use std::time::Duration;
use tracing::{info, warn};

use super::StageContext;
use crate::config::ms;
use crate::driver::{Locator, WaitState};
use crate::error::E2eResult;
use crate::wait::{act_awaiting, poll_until};

const ENABLED_POLL: Duration = Duration::from_millis(100);

/// Click "proceed to checkout" and land on the checkout route.
///
/// A click that does not produce a navigation is retried exactly once as a
/// DOM-level click. The route check afterwards has no fallback.
pub async fn proceed_to_checkout(cx: &StageContext<'_>) -> E2eResult<()> {
    let driver = cx.driver;
    let button = Locator::css(&cx.selectors.proceed_to_checkout).first();
    let bound = ms(cx.timeouts.checkout_button_ms);

    driver.wait_for(&button, WaitState::Visible, bound).await?;
    poll_until("checkout button enabled", bound, ENABLED_POLL, || driver.is_enabled(&button)).await?;

    let navigation = ms(cx.timeouts.navigation_ms);
    let primary = act_awaiting(
        driver.wait_for_navigation(navigation),
        driver.click(&button, ms(cx.timeouts.primary_click_ms)),
    )
    .await;

    if let Err(e) = primary {
        warn!("Checkout click did not navigate ({}), retrying with a DOM click", e);
        act_awaiting(driver.wait_for_navigation(navigation), driver.dom_click(&button)).await?;
    }

    driver
        .wait_for_url(&cx.selectors.checkout_url_pattern, ms(cx.timeouts.checkout_url_ms))
        .await?;
    info!("On checkout page: {}", driver.current_url().await?);
    Ok(())
}
