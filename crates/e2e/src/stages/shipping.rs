//! Shipping address and method

use rand::Rng;
use std::time::Duration;
use tracing::{debug, info};

use checkout_common::{ShippingAddress, ShippingMethod, ShippingSelection};

use super::StageContext;
use crate::config::{ms, ShippingPolicy};
use crate::driver::{Locator, WaitState};
use crate::error::{E2eError, E2eResult};
use crate::wait::poll_until;

const CHECKED_POLL: Duration = Duration::from_millis(100);

/// Fill the shipping form, pick a method and continue.
///
/// The continue button is only clicked once the chosen method reports
/// checked. For the priced method the displayed price is captured first so
/// the caller can compare it with the next page.
pub async fn fill_shipping<R: Rng + ?Sized>(
    cx: &StageContext<'_>,
    address: &ShippingAddress,
    policy: ShippingPolicy,
    rng: &mut R,
) -> E2eResult<ShippingSelection> {
    address.validate_shipping()?;
    let driver = cx.driver;
    let sel = &cx.selectors.shipping;
    let email = address.email.as_deref().unwrap_or_default();

    driver
        .wait_for(&Locator::css(&sel.email), WaitState::Visible, ms(cx.timeouts.shipping_form_ms))
        .await?;

    let fields = [
        (&sel.email, email),
        (&sel.first_name, address.first_name.as_str()),
        (&sel.last_name, address.last_name.as_str()),
        (&sel.company, address.company.as_str()),
        (&sel.street1, address.street1.as_str()),
        (&sel.street2, address.street2.as_str()),
    ];
    for (selector, value) in fields {
        driver.fill(&Locator::css(selector), value).await?;
    }
    driver.select_option(&Locator::css(&sel.country), &address.country).await?;
    driver.fill(&Locator::css(&sel.city), &address.city).await?;
    driver.fill(&Locator::css(&sel.postcode), &address.postcode).await?;
    driver.fill(&Locator::css(&sel.telephone), &address.telephone).await?;

    let chosen_method = policy.choose(rng);
    debug!("Shipping method {:?} (policy {:?})", chosen_method, policy);

    let method = Locator::css(sel.method(chosen_method));
    driver
        .wait_for(&method, WaitState::Visible, ms(cx.timeouts.shipping_method_ms))
        .await?;
    driver.set_checked(&method, true).await?;

    let expected_price = match chosen_method {
        ShippingMethod::Priced => {
            let price = Locator::css(&sel.priced_method_price).first();
            driver
                .wait_for(&price, WaitState::Visible, ms(cx.timeouts.shipping_price_ms))
                .await?;
            let text = driver.text_content(&price).await?.unwrap_or_default();
            let text = text.trim().to_string();
            if text.is_empty() {
                return Err(E2eError::AssertionFailed(
                    "priced shipping method shows no price".to_string(),
                ));
            }
            Some(text)
        }
        ShippingMethod::Standard => None,
    };

    poll_until(
        "shipping method checked",
        ms(cx.timeouts.method_checked_ms),
        CHECKED_POLL,
        || driver.is_checked(&method),
    )
    .await?;

    driver
        .click(&Locator::css(&sel.continue_button), ms(cx.timeouts.element_ms))
        .await?;

    info!("Shipping submitted with {:?} method", chosen_method);
    Ok(ShippingSelection { chosen_method, expected_price })
}

/// Compare the captured price with the one shown on the following page
pub async fn verify_shipping_price(cx: &StageContext<'_>, selection: &ShippingSelection) -> E2eResult<()> {
    let Some(expected) = &selection.expected_price else {
        return Ok(());
    };

    let shown = Locator::css(&cx.selectors.shipping.next_page_price).first();
    cx.driver
        .wait_for(&shown, WaitState::Visible, ms(cx.timeouts.shipping_price_ms))
        .await?;
    let actual = cx.driver.text_content(&shown).await?.unwrap_or_default();
    let actual = actual.trim();

    if actual != expected.as_str() {
        return Err(E2eError::AssertionFailed(format!(
            "shipping price on next page is '{}', selected '{}'",
            actual, expected
        )));
    }
    debug!("Shipping price {} confirmed", actual);
    Ok(())
}
