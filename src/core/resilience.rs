//! Store call resilience - Timeouts and bounded retries.
//!
//! Every facade call runs through [`with_retry`]: each attempt is bounded by the
//! configured store timeout, and retriable failures (lost races, unavailable
//! store) are retried with exponential backoff up to the configured number of
//! attempts. Everything else surfaces immediately.

use crate::{
    config::settings::LedgerSettings,
    errors::{Error, Result},
};
use std::future::Future;
use std::time::Duration;

/// How a store call is bounded and retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, at least 1
    pub attempts: u32,
    /// Delay before the second attempt
    pub initial_backoff: Duration,
    /// Upper bound for one attempt
    pub timeout: Duration,
}

impl RetryPolicy {
    /// Builds the policy described by the ledger settings.
    #[must_use]
    pub const fn from_settings(settings: &LedgerSettings) -> Self {
        Self {
            attempts: settings.retry_attempts,
            initial_backoff: settings.retry_backoff(),
            timeout: settings.store_timeout(),
        }
    }
}

/// Runs `fut`, turning an elapsed timeout into [`Error::StoreUnavailable`].
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .unwrap_or_else(|_| {
            Err(Error::StoreUnavailable {
                message: format!("store call exceeded {}ms", limit.as_millis()),
            })
        })
}

/// Runs `op` until it succeeds, fails with a non-retriable error, or the policy's
/// attempts are used up.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.attempts.max(1);
    let mut backoff = policy.initial_backoff;
    let mut attempt = 1;

    loop {
        match with_timeout(policy.timeout, op()).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retriable() && attempt < attempts => {
                tracing::warn!(
                    operation,
                    attempt,
                    backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "retriable store failure"
                );
                tokio::time::sleep(backoff).await;
                backoff = backoff.saturating_mul(2);
                attempt += 1;
            }
            Err(err) => {
                if err.is_retriable() {
                    tracing::error!(operation, attempts, error = %err, "giving up after retries");
                }
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    const fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            initial_backoff: Duration::from_millis(1),
            timeout: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn test_retries_transient_failures_then_succeeds() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = with_retry(&fast_policy(3), "flaky", move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(Error::StoreUnavailable {
                    message: "down".to_string(),
                })
            } else {
                Ok(7)
            }
        })
        .await;

        assert!(matches!(result, Ok(7)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_configured_attempts() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<()> = with_retry(&fast_policy(2), "down", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(Error::ConflictRetry {
                entity: "transaction",
                key: "1".to_string(),
            })
        })
        .await;

        assert!(matches!(result, Err(Error::ConflictRetry { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permission_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<()> = with_retry(&fast_policy(5), "forbidden", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(Error::Forbidden {
                entity: "transaction",
                id: 1,
                user_id: "mallory".to_string(),
            })
        })
        .await;

        assert!(matches!(result, Err(Error::Forbidden { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_hung_call_times_out() {
        let result: Result<()> = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(Error::StoreUnavailable { .. })));
    }
}
