//! Fixed-backoff retry for transient network failures
//!
//! **Algorithm:**
//! 1. Attempt operation
//! 2. If successful, return result
//! 3. If the error is transient and attempts remain: log WARN, wait the
//!    error-specific backoff, retry
//! 4. Otherwise return the error (non-transient errors are never retried)

use std::future::Future;
use std::time::Duration;

/// Retry budget and per-cause waits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first try included
    pub max_attempts: u32,
    /// Wait after the service reported itself unavailable (HTTP 503)
    pub unavailable_backoff: Duration,
    /// Wait after a transport failure or timeout
    pub transport_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            unavailable_backoff: Duration::from_secs(2),
            transport_backoff: Duration::from_secs(1),
        }
    }
}

/// Errors that know whether (and how long) to wait before a retry
pub trait TransientError: std::fmt::Display {
    /// `Some(wait)` for transient failures, `None` for permanent ones
    fn retry_delay(&self, policy: &RetryPolicy) -> Option<Duration>;
}

/// Run `operation` until it succeeds, fails permanently, or the attempt budget is spent
///
/// # Arguments
/// * `operation_name` - Name for logging (e.g. "catalog search")
/// * `policy` - Attempt budget and backoff per failure cause
/// * `operation` - Async closure performing one attempt
pub async fn retry_transient<F, Fut, T, E>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: TransientError,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        if attempt > 1 {
            tracing::debug!(operation = operation_name, attempt, "Retrying operation");
        }

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                let Some(delay) = err.retry_delay(policy) else {
                    return Err(err);
                };

                if attempt >= max_attempts {
                    tracing::warn!(
                        operation = operation_name,
                        attempt,
                        error = %err,
                        "Operation failed: retry budget exhausted"
                    );
                    return Err(err);
                }

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient failure, will retry after backoff"
                );

                tokio::time::sleep(delay).await;
            }
        }
    }
}
