//! Bounded native calls
//!
//! Native stop/unload calls can hang when the view behind them has been
//! recycled. Every call site wraps the call in [`bounded`], which returns a
//! tagged outcome instead of racing against a timer ad hoc. A timed-out call
//! is abandoned (its future is dropped) and never retried.

use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};
use vfeed_common::UnitId;

/// Result of a bounded call
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome<T> {
    Completed(T),
    TimedOut,
}

impl<T> CallOutcome<T> {
    pub fn is_timed_out(&self) -> bool {
        matches!(self, CallOutcome::TimedOut)
    }

    pub fn completed(self) -> Option<T> {
        match self {
            CallOutcome::Completed(value) => Some(value),
            CallOutcome::TimedOut => None,
        }
    }
}

/// Run `fut` for at most `limit`
pub async fn bounded<F>(call: &'static str, limit: Duration, fut: F) -> CallOutcome<F::Output>
where
    F: Future,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(value) => CallOutcome::Completed(value),
        Err(_) => {
            warn!(
                "{}",
                Error::NativeCallTimeout {
                    call,
                    after_ms: limit.as_millis() as u64,
                }
            );
            CallOutcome::TimedOut
        }
    }
}

/// Bounded native call where a timeout counts as success
///
/// Errors are classified and logged here; the caller decides whether a
/// returned error aborts its sequence.
pub(crate) async fn soft_call<F>(unit_id: &UnitId, call: &'static str, limit: Duration, fut: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    match bounded(call, limit, fut).await {
        CallOutcome::Completed(Ok(())) => Ok(()),
        CallOutcome::Completed(Err(e)) => {
            log_native_error(unit_id, call, &e);
            Err(e)
        }
        CallOutcome::TimedOut => Ok(()),
    }
}

/// Log a native failure at a level matching how routine it is
pub(crate) fn log_native_error(unit_id: &UnitId, call: &'static str, err: &Error) {
    if err.is_benign() {
        debug!("{} on {} ignored: {}", call, unit_id, err);
    } else {
        warn!("{} on {} failed: {}", call, unit_id, err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_completed_within_limit() {
        let outcome = bounded("stop", Duration::from_millis(500), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            7
        })
        .await;
        assert_eq!(outcome, CallOutcome::Completed(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_call_times_out() {
        let started = tokio::time::Instant::now();
        let outcome = bounded("unload", Duration::from_millis(500), std::future::pending::<()>()).await;

        assert!(outcome.is_timed_out());
        assert_eq!(outcome.completed(), None);
        assert!(started.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_soft_call_treats_timeout_as_success() {
        let id = UnitId::new("u1");
        let result = soft_call(&id, "stop", Duration::from_millis(50), async {
            std::future::pending::<Result<()>>().await
        })
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_soft_call_returns_errors() {
        let id = UnitId::new("u1");
        let result = soft_call(&id, "stop", Duration::from_millis(50), async {
            Err(Error::from_native("Invalid view returned from registry"))
        })
        .await;
        assert!(matches!(result, Err(Error::InvalidHandle(_))));
    }
}
