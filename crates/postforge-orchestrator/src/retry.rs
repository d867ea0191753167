//! Bounded retry with exponential backoff for model calls.

use postforge_abstraction::ModelError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry policy shared by every agent.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero behaves as one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Backoff multiplier (e.g., 2.0 for exponential backoff).
    pub multiplier: f64,
    /// Deadline for a single call.
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            multiplier: 2.0,
            call_timeout: Duration::from_secs(60),
        }
    }
}

/// A successful call and the attempts it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempted<T> {
    /// The call's result.
    pub value: T,
    /// Attempts made, including the successful one.
    pub attempts: u32,
}

impl<T> Attempted<T> {
    /// Retries performed before success.
    pub const fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// The final error of a call that could not be completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryFailure {
    /// The last error observed.
    pub error: ModelError,
    /// Attempts made.
    pub attempts: u32,
}

impl RetryPolicy {
    /// Create a new retry policy with the default call timeout.
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        multiplier: f64,
    ) -> Self {
        Self { max_attempts, initial_delay, max_delay, multiplier, ..Self::default() }
    }

    /// A policy that retries immediately, without sleeping.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO, 1.0)
    }

    /// Sets the per-call deadline.
    #[must_use]
    pub const fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Calculate the delay before retry number `retry` (zero-based).
    ///
    /// Uses exponential backoff: initial_delay * multiplier^retry, capped at max_delay.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let delay_ms = (self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent))
            .min(self.max_delay.as_millis() as f64);
        if delay_ms.is_nan() || delay_ms <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_millis(delay_ms as u64)
    }

    /// Runs `op` until it succeeds, fails with a non-transient error, or the
    /// attempt cap is reached.
    ///
    /// Each attempt is bounded by `call_timeout`; an elapsed deadline counts as
    /// a transient [`ModelError::Timeout`].
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<Attempted<T>, RetryFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ModelError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let outcome = match tokio::time::timeout(self.call_timeout, op()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ModelError::Timeout(format!(
                    "{label} call exceeded {} ms",
                    self.call_timeout.as_millis()
                ))),
            };

            match outcome {
                Ok(value) => {
                    debug!(label, attempt, "Model call succeeded");
                    return Ok(Attempted { value, attempts: attempt });
                }
                Err(error) if error.is_transient() && attempt < max_attempts => {
                    let delay = self.delay_for(attempt - 1);
                    warn!(
                        label,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        class = %error.class(),
                        "Transient model failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => {
                    warn!(label, attempt, class = %error.class(), error = %error, "Model call failed");
                    return Err(RetryFailure { error, attempts: attempt });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_for() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(10), Duration::from_secs(8));
        assert_eq!(RetryPolicy::immediate(3).delay_for(4), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = RetryPolicy::immediate(3)
            .run("test", || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ModelError::RateLimited { provider: "openai".into(), message: None })
                } else {
                    Ok("ok")
                }
            })
            .await
            .unwrap();

        assert_eq!(result.value, "ok");
        assert_eq!(result.attempts, 2);
        assert_eq!(result.retries(), 1);
    }

    #[tokio::test]
    async fn test_non_transient_is_not_retried() {
        let calls = AtomicU32::new(0);
        let failure = RetryPolicy::immediate(5)
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ModelError::Authentication("bad key".into()))
            })
            .await
            .unwrap_err();

        assert_eq!(failure.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cap_is_enforced() {
        let calls = AtomicU32::new(0);
        let failure = RetryPolicy::immediate(3)
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ModelError::ServerError { status: 503, message: "busy".into() })
            })
            .await
            .unwrap_err();

        assert_eq!(failure.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(failure.error, ModelError::ServerError { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_zero_attempts_runs_once() {
        let failure = RetryPolicy::immediate(0)
            .run("test", || async { Err::<(), _>(ModelError::Timeout("t".into())) })
            .await
            .unwrap_err();
        assert_eq!(failure.attempts, 1);
    }

    #[tokio::test]
    async fn test_call_timeout_becomes_timeout_error() {
        let policy = RetryPolicy::immediate(2).with_call_timeout(Duration::from_millis(10));
        let failure = policy
            .run("slow", || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<(), ModelError>(())
            })
            .await
            .unwrap_err();

        assert!(matches!(failure.error, ModelError::Timeout(_)));
        assert_eq!(failure.attempts, 2);
    }
}
