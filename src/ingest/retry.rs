//! Retry with exponential backoff.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::Result;

/// Retry settings for one upstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each failure.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Policy from attempt count and base delay in milliseconds.
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_millis(base_delay_ms),
        }
    }

    /// Delay after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << shift)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, 1000)
    }
}

/// Run `op` until it succeeds, fails permanently, or attempts run out.
///
/// Errors for which [`TrendError::is_retryable`](crate::TrendError::is_retryable)
/// is false (401/403/404, parse errors, missing keys) are returned at once.
pub async fn retry_with_backoff<T, F, Fut>(label: &str, policy: RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => {
                debug!(label, attempt, error = %e, "Permanent error, not retrying");
                return Err(e);
            }
            Err(e) if attempt >= policy.max_attempts => {
                warn!(label, attempts = attempt, error = %e, "Giving up after retries");
                return Err(e);
            }
            Err(e) => {
                let delay = policy.delay_after(attempt);
                debug!(label, attempt, ?delay, error = %e, "Retrying");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TrendError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_doubles() {
        let p = RetryPolicy::new(4, 100);
        assert_eq!(p.delay_after(1), Duration::from_millis(100));
        assert_eq!(p.delay_after(2), Duration::from_millis(200));
        assert_eq!(p.delay_after(3), Duration::from_millis(400));
    }

    #[test]
    fn test_zero_attempts_means_one() {
        assert_eq!(RetryPolicy::new(0, 10).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = &AtomicU32::new(0);
        let result = retry_with_backoff("test", RetryPolicy::new(3, 5), || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(TrendError::Http {
                    status: 503,
                    url: "https://x".into(),
                })
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = &AtomicU32::new(0);
        let result: Result<()> = retry_with_backoff("test", RetryPolicy::new(2, 10), || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TrendError::Network("reset".into()))
        })
        .await;

        assert!(matches!(result, Err(TrendError::Network(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_errors_abort_immediately() {
        for status in [401u16, 403, 404] {
            let calls = &AtomicU32::new(0);
            let result: Result<()> = retry_with_backoff("test", RetryPolicy::new(5, 1000), || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TrendError::Http {
                    status,
                    url: "https://x".into(),
                })
            })
            .await;

            assert!(result.is_err());
            assert_eq!(calls.load(Ordering::SeqCst), 1, "status {status}");
        }
    }
}
