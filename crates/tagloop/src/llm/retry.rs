//! Caller-side retry with exponential backoff and jitter.
//!
//! The agent surfaces every [`LlmError`] to whoever drives it. Drivers that
//! want retries wrap their calls in [`retry_with_backoff`], which retries
//! only [`LlmError::is_retryable`] failures and honours the backend's
//! `retry_after` hint when one was given.

use crate::llm::LlmError;
use std::future::Future;
use std::time::Duration;
use tracing::info;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries (0 = no retries, just fail immediately).
    pub max_retries: u32,
    /// Initial delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Backoff multiplier (typically 2.0 for exponential backoff).
    pub multiplier: f64,
    /// Whether to add jitter to prevent thundering herd.
    pub jitter: bool,
    /// Ceiling applied to a backend `retry_after` hint.
    pub max_retry_after: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            multiplier: 2.0,
            jitter: true,
            max_retry_after: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// Create a config with the given number of retries. Uses sensible defaults.
    pub fn with_retries(retries: u32) -> Self {
        Self {
            max_retries: retries,
            ..Default::default()
        }
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        if self.jitter {
            // Deterministic jitter keyed on the attempt number.
            let jitter_factor = match attempt % 4 {
                0 => 0.75,
                1 => 0.90,
                2 => 0.60,
                _ => 0.85,
            };
            Duration::from_secs_f64(capped * jitter_factor)
        } else {
            Duration::from_secs_f64(capped)
        }
    }

    /// Delay before retrying `error`: the backend hint (at most
    /// `max_retry_after`) if present, else the backoff schedule.
    pub fn delay_for_error(&self, error: &LlmError, attempt: u32) -> Duration {
        match error.retry_after() {
            Some(hint) => hint.min(self.max_retry_after),
            None => self.delay_for_attempt(attempt),
        }
    }
}

/// Run `op` until it succeeds, fails permanently, or retries run out.
pub async fn retry_with_backoff<T, F, Fut>(config: &RetryConfig, mut op: F) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                let delay = config.delay_for_error(&e, attempt);
                info!(
                    "LLM call failed ({e}); retry {}/{} in {:.1}s",
                    attempt + 1,
                    config.max_retries,
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(retries: u32) -> RetryConfig {
        RetryConfig {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            jitter: false,
            ..RetryConfig::with_retries(retries)
        }
    }

    #[test]
    fn default_config_no_retries() {
        assert_eq!(RetryConfig::default().max_retries, 0);
    }

    #[test]
    fn delay_increases_exponentially() {
        let config = RetryConfig {
            jitter: false,
            ..RetryConfig::with_retries(5)
        };
        let d0 = config.delay_for_attempt(0);
        let d1 = config.delay_for_attempt(1);
        let d2 = config.delay_for_attempt(2);

        assert!(d1 > d0, "d1={d1:?} should be > d0={d0:?}");
        assert!(d2 > d1, "d2={d2:?} should be > d1={d1:?}");
    }

    #[test]
    fn delay_capped_at_max() {
        let config = RetryConfig {
            jitter: false,
            max_delay: Duration::from_secs(2),
            ..RetryConfig::with_retries(10)
        };
        assert!(config.delay_for_attempt(10) <= Duration::from_secs(2));
    }

    #[test]
    fn backend_hint_overrides_schedule() {
        let config = RetryConfig::with_retries(3);
        let err = LlmError::RateLimited {
            message: "quota".into(),
            retry_after: Some(Duration::from_secs(42)),
        };
        assert_eq!(config.delay_for_error(&err, 0), Duration::from_secs(42));
    }

    #[test]
    fn backend_hint_is_capped() {
        let config = RetryConfig::with_retries(3);
        let err = LlmError::RateLimited {
            message: "quota".into(),
            retry_after: Some(Duration::from_secs(3600)),
        };
        assert_eq!(config.delay_for_error(&err, 0), config.max_retry_after);
        assert_eq!(config.max_retry_after, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(&fast(3), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(LlmError::Transport("connection reset".into()))
                } else {
                    Ok("reply")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "reply");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(&fast(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(LlmError::Unauthorized("bad key".into())) }
        })
        .await;
        assert!(matches!(result, Err(LlmError::Unauthorized(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(&fast(2), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(LlmError::Transport("timeout".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
