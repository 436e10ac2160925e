//! Cart builder

use tracing::{debug, info};

use checkout_common::ProductScenario;

use super::StageContext;
use crate::config::ms;
use crate::driver::{Locator, WaitState};
use crate::error::{E2eError, E2eResult};

/// Add every product of the scenario, then open the cart page
pub async fn build_cart(cx: &StageContext<'_>, scenario: &ProductScenario) -> E2eResult<()> {
    if scenario.product_identifiers.is_empty() {
        return Err(E2eError::Config(format!(
            "product scenario '{}' has no products",
            scenario.label
        )));
    }

    let add = Locator::role("button", &cx.selectors.add_to_cart_name);
    for product in &scenario.product_identifiers {
        debug!("Adding {} to cart", product);
        cx.driver.goto(product).await?;
        cx.driver.click(&add, ms(cx.timeouts.element_ms)).await?;
        tokio::time::sleep(ms(cx.timeouts.add_to_cart_settle_ms)).await;
    }

    let cart_link = Locator::role("link", &cx.selectors.cart_link_name);
    cx.driver.click(&cart_link, ms(cx.timeouts.element_ms)).await?;
    cx.driver
        .wait_for(
            &Locator::css(&cx.selectors.proceed_to_checkout),
            WaitState::Visible,
            ms(cx.timeouts.cart_ready_ms),
        )
        .await?;

    info!(
        "Cart ready with {} product(s) from '{}'",
        scenario.product_identifiers.len(),
        scenario.label
    );
    Ok(())
}
