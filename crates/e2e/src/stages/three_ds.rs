//! 3-D Secure challenge handling
//!
//! ```text
//! choice absent ──> Skipped
//! detect frame (poll) ──found──> click in frame ──ok──> ClickedInFrame
//!        │                           │ detached
//!        │                           └──> re-detect (short) ──> click once more
//!        │ not found / button missing                 (second detach propagates)
//!        v
//! main-page button ──ok──> ClickedOnPage
//!        │ not found
//!        v
//! NotPresented
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use checkout_common::ChallengeChoice;

use super::StageContext;
use crate::config::ms;
use crate::driver::{Locator, WaitState};
use crate::error::E2eResult;
use crate::wait::poll_for;

/// How the challenge step ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "resolution", rename_all = "snake_case")]
pub enum ChallengeResolution {
    /// No challenge was expected for this card
    Skipped,
    ClickedInFrame { frame_url: String },
    ClickedOnPage,
    /// Nothing to click; the issuer did not ask for a challenge
    NotPresented,
}

/// Answer a 3-D Secure challenge with `choice`, if one shows up.
///
/// Captures a screenshot before returning any error.
pub async fn handle_challenge(
    cx: &StageContext<'_>,
    choice: Option<ChallengeChoice>,
) -> E2eResult<ChallengeResolution> {
    let Some(choice) = choice else {
        debug!("No challenge expected");
        return Ok(ChallengeResolution::Skipped);
    };

    match resolve(cx, choice).await {
        Ok(resolution) => {
            info!("Challenge resolved: {:?}", resolution);
            Ok(resolution)
        }
        Err(e) => {
            cx.artifacts
                .capture_failure_screenshot(cx.driver, Some("challenge"))
                .await;
            Err(e)
        }
    }
}

/// URL of the first attached frame from a known challenge provider
async fn detect_frame(cx: &StageContext<'_>, bound_ms: u64) -> E2eResult<Option<String>> {
    let driver = cx.driver;
    let markers = &cx.selectors.challenge.frame_url_markers;
    let found = poll_for(
        "challenge frame",
        ms(bound_ms),
        ms(cx.timeouts.challenge_poll_interval_ms),
        move || async move {
            let frames = driver.frames().await?;
            Ok(frames
                .into_iter()
                .find(|f| markers.iter().any(|m| f.url.contains(m.as_str())))
                .map(|f| f.url))
        },
    )
    .await;

    match found {
        Ok(url) => Ok(Some(url)),
        Err(e) if e.is_timeout() => Ok(None),
        Err(e) => Err(e),
    }
}

async fn click_in_frame(cx: &StageContext<'_>, frame_url: &str, choice: ChallengeChoice) -> E2eResult<()> {
    let button = Locator::css(cx.selectors.challenge.button(choice.label()))
        .in_frame_url(frame_url)
        .first();
    cx.driver
        .wait_for(&button, WaitState::Visible, ms(cx.timeouts.challenge_button_ms))
        .await?;
    cx.driver.click(&button, ms(cx.timeouts.element_ms)).await
}

async fn resolve(cx: &StageContext<'_>, choice: ChallengeChoice) -> E2eResult<ChallengeResolution> {
    let mut frame_seen = false;

    if let Some(frame_url) = detect_frame(cx, cx.timeouts.challenge_detect_ms).await? {
        frame_seen = true;
        debug!("Challenge frame at {}", frame_url);
        match click_in_frame(cx, &frame_url, choice).await {
            Ok(()) => return Ok(ChallengeResolution::ClickedInFrame { frame_url }),
            Err(e) if e.is_detached() => {
                warn!("Challenge frame detached during click, looking again");
                if let Some(frame_url) = detect_frame(cx, cx.timeouts.challenge_retry_ms).await? {
                    match click_in_frame(cx, &frame_url, choice).await {
                        Ok(()) => return Ok(ChallengeResolution::ClickedInFrame { frame_url }),
                        Err(e) if e.is_timeout() => {
                            warn!("Challenge button missing after retry: {}", e)
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
            Err(e) if e.is_timeout() => warn!("Challenge button not found in frame: {}", e),
            Err(e) => return Err(e),
        }
    }

    let fallback = Locator::role("button", choice.label()).first();
    match cx
        .driver
        .wait_for(&fallback, WaitState::Visible, ms(cx.timeouts.challenge_fallback_ms))
        .await
    {
        Ok(()) => {
            cx.driver.click(&fallback, ms(cx.timeouts.element_ms)).await?;
            Ok(ChallengeResolution::ClickedOnPage)
        }
        Err(e) if e.is_timeout() => {
            if frame_seen {
                warn!("Challenge frame appeared without a '{}' button, continuing", choice.label());
            } else {
                info!("No challenge presented, continuing");
            }
            Ok(ChallengeResolution::NotPresented)
        }
        Err(e) => Err(e),
    }
}
