//! Bounded retry with exponential backoff for store calls.

use super::StoreError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// How store calls are retried when they fail transiently.
///
/// Every attempt is bounded by `call_timeout`; a timed-out attempt counts as
/// a transient failure. Non-transient errors are returned immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            call_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Backoff before the retry following failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let factor = 2u32.saturating_pow(exponent);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run `call` until it succeeds, fails permanently, or attempts run out.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt: u32 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            let outcome = match tokio::time::timeout(self.call_timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(StoreError::Timeout(self.call_timeout)),
            };
            match outcome {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "Store call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
            call_timeout: Duration::from_millis(200),
        }
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(30), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = fast_policy(3)
            .run("get", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(StoreError::unavailable("flaky"))
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast_policy(2)
            .run("bulk", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::unavailable("down"))
            })
            .await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast_policy(5)
            .run("scroll", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::CursorExpired("s-1".to_string()))
            })
            .await;
        assert!(matches!(result, Err(StoreError::CursorExpired(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_call_times_out() {
        let policy = RetryPolicy {
            call_timeout: Duration::from_millis(10),
            ..fast_policy(1)
        };
        let result = policy
            .run("count", || async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(1)
            })
            .await;
        assert!(matches!(result, Err(StoreError::Timeout(_))));
    }
}
