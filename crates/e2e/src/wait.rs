//! Bounded waiting combinators shared by the stages

use futures::future::{select_ok, BoxFuture, FutureExt};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

use crate::driver::{Driver, Locator};
use crate::error::{E2eError, E2eResult};

/// Which of two raced operations finished first
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Race<A, B> {
    First(A),
    Second(B),
}

/// Re-run `probe` every `interval` until it yields a value or `timeout` elapses.
///
/// Probe timeouts count as "not yet"; any other error ends the wait.
pub async fn poll_for<T, F, Fut>(
    what: &str,
    timeout: Duration,
    interval: Duration,
    mut probe: F,
) -> E2eResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = E2eResult<Option<T>>>,
{
    let deadline = Instant::now() + timeout;
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match probe().await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(e) if e.is_timeout() => trace!("{}: probe timed out: {}", what, e),
            Err(e) => return Err(e),
        }
        if Instant::now() >= deadline {
            return Err(E2eError::Timeout(format!(
                "{} ({} attempts over {:?})",
                what, attempts, timeout
            )));
        }
        tokio::time::sleep(interval).await;
    }
}

/// [`poll_for`] for a yes/no condition
pub async fn poll_until<F, Fut>(what: &str, timeout: Duration, interval: Duration, mut probe: F) -> E2eResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = E2eResult<bool>>,
{
    poll_for(what, timeout, interval, || {
        let fut = probe();
        async move { fut.await.map(|done| done.then_some(())) }
    })
    .await
}

/// Race two fallible operations; the first success wins.
///
/// Fails only when both fail, with the error of whichever failed last.
pub async fn first_completed<'a, A, B, FA, FB>(first: FA, second: FB) -> E2eResult<Race<A, B>>
where
    A: Send + 'a,
    B: Send + 'a,
    FA: Future<Output = E2eResult<A>> + Send + 'a,
    FB: Future<Output = E2eResult<B>> + Send + 'a,
{
    let racers: Vec<BoxFuture<'a, E2eResult<Race<A, B>>>> = vec![
        first.map(|r| r.map(Race::First)).boxed(),
        second.map(|r| r.map(Race::Second)).boxed(),
    ];
    let (winner, _losers) = select_ok(racers).await?;
    Ok(winner)
}

/// Start `wait` before `act` and require both to succeed.
///
/// Used for "click and wait for the navigation it causes": the listener has
/// to be armed before the click fires.
pub async fn act_awaiting<W, A, T>(wait: W, act: A) -> E2eResult<T>
where
    W: Future<Output = E2eResult<()>>,
    A: Future<Output = E2eResult<T>>,
{
    let ((), value) = futures::try_join!(wait, act)?;
    Ok(value)
}

/// First visible match of `locator`, pinned with `nth`
pub async fn pick_visible(driver: &dyn Driver, locator: &Locator) -> E2eResult<Option<Locator>> {
    let count = driver.count(locator).await?;
    for index in 0..count {
        let candidate = locator.clone().nth(index);
        if driver.is_visible(&candidate).await? {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::scripted::{Element, ScriptedDriver};
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_succeeds_after_attempts() {
        let calls = AtomicU32::new(0);
        poll_until("third call", Duration::from_secs(5), Duration::from_millis(250), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(n >= 2) }
        })
        .await
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_times_out() {
        let err = poll_until("never", Duration::from_secs(1), Duration::from_millis(250), || async {
            Ok(false)
        })
        .await
        .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_poll_propagates_hard_errors() {
        let err = poll_for::<(), _, _>("detached", Duration::from_secs(1), Duration::from_millis(10), || async {
            Err(E2eError::FrameDetached("gone".into()))
        })
        .await
        .unwrap_err();
        assert!(err.is_detached());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_completed_prefers_success() {
        let slow_failure = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err::<u8, _>(E2eError::Timeout("failure message".into()))
        };
        let success = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok("order 42")
        };
        let winner = first_completed(slow_failure, success).await.unwrap();
        assert_eq!(winner, Race::Second("order 42"));
    }

    #[tokio::test]
    async fn test_first_completed_both_fail() {
        let a = async { Err::<(), _>(E2eError::Timeout("a".into())) };
        let b = async { Err::<(), _>(E2eError::Timeout("b".into())) };
        assert!(first_completed(a, b).await.unwrap_err().is_timeout());
    }

    #[tokio::test]
    async fn test_pick_visible_skips_hidden_duplicates() {
        let driver = ScriptedDriver::new();
        driver
            .add(Element::css("button.action-update").hidden())
            .add(Element::css("button.action-update"));
        let picked = pick_visible(&driver, &Locator::css("button.action-update"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(picked.nth, Some(1));

        let none = pick_visible(&driver, &Locator::css("missing")).await.unwrap();
        assert!(none.is_none());
    }
}
