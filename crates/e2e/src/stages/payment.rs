//! Payment method selection and card entry

use tracing::{debug, info};

use checkout_common::{CardFixture, PaymentFlow};

use super::StageContext;
use crate::config::{ms, FramedInput};
use crate::driver::{Locator, WaitState};
use crate::error::E2eResult;

fn framed(field: &FramedInput) -> Locator {
    Locator::css(&field.input).in_frame(&field.frame)
}

/// Activate the label for one of the two payment sub-flows
pub async fn select_payment_method(cx: &StageContext<'_>, flow: PaymentFlow) -> E2eResult<()> {
    let sel = &cx.selectors.payment;
    let label = match flow {
        PaymentFlow::Iframe => &sel.iframe_method_label,
        PaymentFlow::Redirect => &sel.redirect_method_label,
    };
    let label = Locator::css(label).first();
    cx.driver
        .wait_for(&label, WaitState::Visible, ms(cx.timeouts.payment_method_ms))
        .await?;
    cx.driver.click(&label, ms(cx.timeouts.element_ms)).await?;
    info!("Selected {} payment", flow);
    Ok(())
}

/// Wait until every hosted card input is visible
pub async fn wait_for_payment_frames_ready(cx: &StageContext<'_>) -> E2eResult<()> {
    for field in cx.selectors.payment.framed_inputs() {
        cx.driver
            .wait_for(&framed(field), WaitState::Visible, ms(cx.timeouts.payment_frames_ms))
            .await?;
    }
    debug!("Payment frames ready");
    Ok(())
}

/// Fill the four iframe-hosted inputs, then tab out of CVV so the host page
/// re-evaluates field validity
pub async fn fill_iframe_card(cx: &StageContext<'_>, card: &CardFixture) -> E2eResult<()> {
    let sel = &cx.selectors.payment;
    let name = framed(&sel.name_field);
    cx.driver
        .wait_for(&name, WaitState::Visible, ms(cx.timeouts.payment_frames_ms))
        .await?;

    let values = [
        (&sel.name_field, card.holder_name.as_str()),
        (&sel.card_field, card.number.as_str()),
        (&sel.expiry_field, card.expiry.as_str()),
        (&sel.cvv_field, card.cvv.as_str()),
    ];
    for (field, value) in values {
        cx.driver.fill(&framed(field), value).await?;
    }
    cx.driver.press(&framed(&sel.cvv_field), "Tab").await?;

    info!("Filled hosted card fields for '{}'", card.label);
    Ok(())
}

/// Fill the redirect page's card form and advance it
pub async fn fill_redirect_card(cx: &StageContext<'_>, card: &CardFixture) -> E2eResult<()> {
    let sel = &cx.selectors.payment;
    let driver = cx.driver;
    let expiry = card.expiry()?;

    let widget = Locator::css(&sel.brand_widget);
    driver
        .wait_for(&widget, WaitState::Visible, ms(cx.timeouts.brand_widget_ms))
        .await?;
    driver.click(&widget, ms(cx.timeouts.element_ms)).await?;

    let option = Locator::css(&sel.brand_option).has_text(card.brand()).first();
    driver
        .wait_for(&option, WaitState::Visible, ms(cx.timeouts.element_ms))
        .await?;
    driver.click(&option, ms(cx.timeouts.element_ms)).await?;
    debug!("Brand {} selected", card.brand());

    driver.fill(&Locator::css(&sel.card_number), &card.number).await?;
    driver.select_option(&Locator::css(&sel.expiry_month), &expiry.month).await?;
    driver.select_option(&Locator::css(&sel.expiry_year), &expiry.year).await?;
    // masked input drops programmatic fills
    driver.type_text(&Locator::css(&sel.cvv), &card.cvv).await?;
    driver.click(&Locator::css(&sel.next_button), ms(cx.timeouts.element_ms)).await?;

    info!("Submitted redirect card form for '{}'", card.label);
    Ok(())
}
