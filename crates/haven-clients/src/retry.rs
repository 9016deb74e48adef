//! Bounded exponential backoff for remote stage calls.

use std::future::Future;
use std::time::Duration;

/// Errors that distinguish retryable failures from permanent ones.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Bounded exponential backoff policy.
///
/// One policy instance covers one stage call site; timeouts are per call,
/// never per pipeline, so a slow stage for one request does not starve
/// retries elsewhere.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Total attempts, the first call included.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Multiplier applied to the delay after each retry.
    pub backoff_multiplier: f64,
    /// Ceiling on the delay between attempts.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(200),
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_secs(5),
        }
    }
}

/// Run `op` under `policy`, retrying transient failures with backoff.
///
/// Non-transient errors and the final transient failure are returned to the
/// caller unchanged.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    stage: &'static str,
    mut op: F,
) -> Result<T, E>
where
    E: Transient + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut delay = policy.initial_backoff;
    let mut attempt: u32 = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_attempts.max(1) => {
                tracing::warn!(
                    stage,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient stage failure, backing off"
                );
                tokio::time::sleep(delay).await;
                delay = delay.mul_f64(policy.backoff_multiplier).min(policy.max_backoff);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StageError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(1),
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_millis(4),
        }
    }

    fn timeout() -> StageError {
        StageError::Timeout {
            stage: "risk",
            message: "deadline exceeded".to_string(),
        }
    }

    #[tokio::test]
    async fn transient_failures_retry_until_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, StageError> = with_retry(&fast_policy(), "risk", || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if attempt < 3 {
                    Err(timeout())
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn attempts_are_bounded() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, StageError> = with_retry(&fast_policy(), "risk", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(timeout()) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn contract_violations_fail_fast() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, StageError> = with_retry(&fast_policy(), "simulation", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StageError::contract("simulation", "empty option list")) }
        })
        .await;

        assert!(matches!(result, Err(StageError::Contract { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn first_success_needs_no_backoff() {
        let result: Result<&str, StageError> =
            with_retry(&fast_policy(), "classification", || async { Ok("done") }).await;
        assert_eq!(result.unwrap(), "done");
    }
}
