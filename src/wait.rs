//! Bounded, poll-based waits.
//!
//! Nothing here blocks indefinitely: every loop carries a budget and reports
//! [`HarnessError::Timeout`] when it runs out.

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::WaitConfig;
use crate::error::{HarnessError, HarnessResult};

/// Poll `check` until it yields `Some`, or fail with `Timeout` after `timeout`.
///
/// The check runs at least once even with a zero timeout. Check errors end the wait
/// immediately.
pub async fn poll_until<T, F, Fut>(
    what: &str,
    timeout: Duration,
    interval: Duration,
    mut check: F,
) -> HarnessResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = HarnessResult<Option<T>>>,
{
    let start = Instant::now();
    loop {
        if let Some(value) = check().await? {
            return Ok(value);
        }
        if start.elapsed() >= timeout {
            return Err(HarnessError::timeout(what, start.elapsed()));
        }
        tokio::time::sleep(interval).await;
    }
}

/// How a settle wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    /// Two successive reads agreed on this count
    Stable(usize),
    /// Reads kept changing; the fixed fallback pause was used instead
    Fallback,
}

/// Parameters for waiting out an asynchronous re-render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlePolicy {
    /// Gap between the two reads that must agree
    pub quiet: Duration,
    /// Total time allowed for polling before falling back
    pub budget: Duration,
    /// Fixed pause used when polling never sees a stable snapshot. Also the earliest
    /// point a stable snapshot is accepted.
    pub fallback: Duration,
}

impl SettlePolicy {
    /// Skip polling entirely and always sleep for `delay`
    pub fn fixed(delay: Duration) -> Self {
        Self {
            quiet: Duration::ZERO,
            budget: Duration::ZERO,
            fallback: delay,
        }
    }
}

impl From<&WaitConfig> for SettlePolicy {
    fn from(waits: &WaitConfig) -> Self {
        Self {
            quiet: Duration::from_millis(waits.settle_quiet_ms),
            budget: Duration::from_millis(waits.settle_budget_ms),
            fallback: Duration::from_millis(waits.settle_fallback_ms),
        }
    }
}

/// Wait until `snapshot` returns the same value across two reads `quiet` apart, no
/// earlier than `fallback` after the call.
///
/// Stands in for a "render complete" event the page does not expose. A page may keep
/// showing the old set for a while after a toggle, so agreeing reads inside the
/// `fallback` window do not count.
pub async fn settle<F, Fut>(policy: SettlePolicy, mut snapshot: F) -> HarnessResult<Settled>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = HarnessResult<usize>>,
{
    if policy.budget.is_zero() {
        tokio::time::sleep(policy.fallback).await;
        return Ok(Settled::Fallback);
    }

    let start = Instant::now();
    tokio::time::sleep(policy.quiet).await;
    let mut previous = snapshot().await?;

    while start.elapsed() < policy.budget {
        tokio::time::sleep(policy.quiet).await;
        let current = snapshot().await?;
        if current == previous && start.elapsed() >= policy.fallback {
            debug!(count = current, elapsed = ?start.elapsed(), "render settled");
            return Ok(Settled::Stable(current));
        }
        previous = current;
    }

    warn!(
        budget = ?policy.budget,
        "render did not settle; using fixed {:?} pause",
        policy.fallback
    );
    tokio::time::sleep(policy.fallback).await;
    Ok(Settled::Fallback)
}
