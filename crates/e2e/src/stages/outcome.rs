//! Terminal message verification

use regex::Regex;
use tracing::{error, info, warn};

use checkout_common::{CheckoutOutcome, Expectation, PaymentFlow};

use super::StageContext;
use crate::config::ms;
use crate::driver::{Locator, WaitState};
use crate::error::{E2eError, E2eResult};
use crate::wait::{first_completed, Race};

/// Order reference from a confirmation message
fn order_reference(pattern: &Regex, message: &str) -> Option<String> {
    pattern
        .captures(message)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// The outcome is already known, so a lost screenshot only costs the attachment
async fn keep_screenshot(cx: &StageContext<'_>, name: &str) {
    if let Err(e) = cx.artifacts.screenshot(cx.driver, name).await {
        warn!("Could not capture {} screenshot: {}", name, e);
    }
}

/// First message containing one of the expected substrings
fn matching_failure<'m>(messages: &'m [String], expected: &[String]) -> Option<&'m str> {
    messages
        .iter()
        .map(|m| m.trim())
        .find(|m| expected.iter().any(|e| m.contains(e.as_str())))
}

/// Race the success and failure messages, check the winner's wording and
/// compare the branch with `expectation`
pub async fn verify_outcome(
    cx: &StageContext<'_>,
    flow: PaymentFlow,
    expectation: Expectation,
) -> E2eResult<CheckoutOutcome> {
    let driver = cx.driver;
    let sel = &cx.selectors.order;
    let success = Locator::css(&sel.success_message);
    let failure = Locator::css(&sel.failure_message);
    let bound = ms(cx.timeouts.outcome_ms);

    let winner = first_completed(
        driver.wait_for(&success, WaitState::Visible, bound),
        driver.wait_for(&failure, WaitState::Visible, bound),
    )
    .await;

    let outcome = match winner {
        Ok(Race::First(())) => {
            let pattern = Regex::new(&cx.messages.order_success_pattern)
                .map_err(|e| E2eError::Config(format!("order_success_pattern: {}", e)))?;
            let text = driver.all_text_contents(&success).await?.join("\n");
            let reference = order_reference(&pattern, &text).ok_or_else(|| {
                E2eError::AssertionFailed(format!(
                    "success message '{}' has no order reference",
                    text.trim()
                ))
            })?;
            keep_screenshot(cx, "order confirmation").await;
            cx.artifacts.attach_text("order reference", &reference)?;
            info!("Order {} confirmed", reference);
            CheckoutOutcome::Success { order_reference: reference }
        }
        Ok(Race::Second(())) => {
            let expected = match flow {
                PaymentFlow::Iframe => &cx.messages.iframe_failures,
                PaymentFlow::Redirect => &cx.messages.redirect_failures,
            };
            let messages = driver.all_text_contents(&failure).await?;
            let reason = matching_failure(&messages, expected).ok_or_else(|| {
                E2eError::AssertionFailed(format!(
                    "failure messages {:?} match none of {:?}",
                    messages, expected
                ))
            })?;
            keep_screenshot(cx, "order failure").await;
            info!("Order rejected: {}", reason);
            CheckoutOutcome::Failure { reason_text: reason.to_string() }
        }
        Err(e) => {
            error!("No terminal message after {:?}: {}", bound, e);
            cx.artifacts
                .capture_failure_screenshot(driver, Some("outcome"))
                .await;
            return Err(if e.is_timeout() {
                E2eError::NoTerminalMessage(format!("{} or {}", success, failure))
            } else {
                e
            });
        }
    };

    if !expectation.accepts(&outcome) {
        return Err(E2eError::OutcomeMismatch {
            expected: expectation.to_string(),
            actual: outcome.kind().to_string(),
        });
    }
    Ok(outcome)
}
