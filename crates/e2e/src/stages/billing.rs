//! Billing address divergence and summary verification

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use checkout_common::{Address, BillingAddress, ShippingAddress};

use super::StageContext;
use crate::config::ms;
use crate::driver::{Locator, WaitState};
use crate::error::{E2eError, E2eResult};
use crate::wait::pick_visible;

/// What the billing stage did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingDecision {
    /// Selector of the toggle that was found, if any
    pub toggle: Option<String>,
    pub diverged: bool,
}

/// First same-as-shipping toggle that becomes visible
async fn find_toggle(cx: &StageContext<'_>) -> E2eResult<Option<Locator>> {
    for selector in &cx.selectors.billing.same_as_shipping_toggles {
        let toggle = Locator::css(selector).first();
        match cx
            .driver
            .wait_for(&toggle, WaitState::Visible, ms(cx.timeouts.billing_toggle_probe_ms))
            .await
        {
            Ok(()) => return Ok(Some(toggle)),
            Err(e) if e.is_timeout() => debug!("Billing toggle {} not shown", selector),
            Err(e) => return Err(e),
        }
    }
    Ok(None)
}

async fn fill_visible(cx: &StageContext<'_>, field: &str, value: &str, select: bool) -> E2eResult<()> {
    let selector = cx.selectors.billing.in_form(field);
    let target = pick_visible(cx.driver, &Locator::css(&selector))
        .await?
        .ok_or_else(|| E2eError::NotFound(format!("no visible billing field {}", selector)))?;
    if select {
        cx.driver.select_option(&target, value).await
    } else {
        cx.driver.fill(&target, value).await
    }
}

/// Possibly uncheck "same as shipping" and submit a distinct billing address.
///
/// Divergence needs the toggle to be present and checked, and a draw below
/// `probability`. Without a toggle the stage does nothing.
pub async fn apply_billing<R: Rng + ?Sized>(
    cx: &StageContext<'_>,
    billing: &BillingAddress,
    probability: f64,
    rng: &mut R,
) -> E2eResult<BillingDecision> {
    let Some(toggle) = find_toggle(cx).await? else {
        info!("No billing toggle on this step, billing follows shipping");
        return Ok(BillingDecision { toggle: None, diverged: false });
    };
    let toggle_name = toggle.to_string();

    let checked = cx.driver.is_checked(&toggle).await?;
    let roll: f64 = rng.gen();
    if !checked || roll >= probability {
        debug!("Billing stays as is (checked={}, roll={:.3})", checked, roll);
        return Ok(BillingDecision { toggle: Some(toggle_name), diverged: false });
    }

    info!("Entering a separate billing address");
    cx.driver.set_checked(&toggle, false).await?;
    cx.driver
        .wait_for(
            &Locator::css(&cx.selectors.billing.new_address_form),
            WaitState::Attached,
            ms(cx.timeouts.billing_form_ms),
        )
        .await?;

    let sel = &cx.selectors.billing;
    fill_visible(cx, &sel.first_name, &billing.first_name, false).await?;
    fill_visible(cx, &sel.last_name, &billing.last_name, false).await?;
    fill_visible(cx, &sel.company, &billing.company, false).await?;
    fill_visible(cx, &sel.street1, &billing.street1, false).await?;
    fill_visible(cx, &sel.street2, &billing.street2, false).await?;
    fill_visible(cx, &sel.country, &billing.country, true).await?;
    fill_visible(cx, &sel.city, &billing.city, false).await?;
    fill_visible(cx, &sel.postcode, &billing.postcode, false).await?;
    fill_visible(cx, &sel.telephone, &billing.telephone, false).await?;

    let update = pick_visible(cx.driver, &Locator::css(&sel.update_button))
        .await?
        .ok_or_else(|| E2eError::NotFound(format!("no visible {}", sel.update_button)))?;
    cx.driver.click(&update, ms(cx.timeouts.element_ms)).await?;

    Ok(BillingDecision { toggle: Some(toggle_name), diverged: true })
}

/// Fields of `expected` missing from the rendered summary
fn missing_fields(summary: &str, expected: &Address) -> Vec<String> {
    let country = expected.country_name();
    expected
        .summary_fields()
        .into_iter()
        .chain(std::iter::once(country.as_str()))
        .filter(|field| !summary.contains(field))
        .map(str::to_string)
        .collect()
}

/// Check the billing summary shows whichever address is active.
///
/// A checked (or absent) toggle means the shipping address applies, and a
/// missing summary is then tolerated.
pub async fn verify_billing_details(
    cx: &StageContext<'_>,
    shipping: &ShippingAddress,
    billing: &BillingAddress,
) -> E2eResult<()> {
    let checked = match find_toggle(cx).await? {
        Some(toggle) => cx.driver.is_checked(&toggle).await?,
        None => true,
    };
    let (expected, which) = if checked {
        (shipping, "shipping")
    } else {
        (billing, "billing")
    };

    let block = Locator::css(&cx.selectors.billing.summary_block);
    let mut summary = pick_visible(cx.driver, &block).await?;
    if summary.is_none() {
        if checked {
            info!("No billing summary shown while same-as-shipping is checked");
            return Ok(());
        }
        warn!("Billing summary not visible yet, retrying once");
        tokio::time::sleep(ms(cx.timeouts.billing_summary_retry_ms)).await;
        summary = pick_visible(cx.driver, &block).await?;
    }
    let summary = summary.ok_or_else(|| {
        E2eError::NotFound(format!("no visible billing summary {}", cx.selectors.billing.summary_block))
    })?;

    let text = cx.driver.text_content(&summary).await?.unwrap_or_default();
    let missing = missing_fields(&text, expected);
    if !missing.is_empty() {
        return Err(E2eError::AssertionFailed(format!(
            "billing summary lacks {} address fields {:?}",
            which, missing
        )));
    }
    info!("Billing summary matches the {} address", which);
    Ok(())
}
