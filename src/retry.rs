//! # Retry Logic with Classified Exponential Backoff
//!
//! Wraps a fallible async operation with exponential backoff and jitter.
//! Only errors classified as retriable (see [`crate::error::ErrorKind::is_retriable`])
//! trigger a wait; everything else propagates immediately.

use crate::error::{Error, Result};
use log::{debug, warn};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Configuration for [`RetryHandler`].
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Base delay before the second attempt, in milliseconds.
    pub delay_ms: u64,
    /// Upper bound on any single delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Multiplier applied to the delay after each failed attempt.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 200,
            max_delay_ms: 10_000,
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a new config, validating that attempts/delays are sane.
    pub fn new(max_attempts: u32, delay_ms: u64, max_delay_ms: u64, multiplier: f64) -> Result<Self> {
        if max_attempts == 0 {
            return Err(Error::config("max_attempts must be >= 1"));
        }
        if multiplier < 1.0 {
            return Err(Error::config("multiplier must be >= 1.0"));
        }
        Ok(Self {
            max_attempts,
            delay_ms,
            max_delay_ms,
            multiplier,
        })
    }

    /// The delay before attempt number `attempt` (1-indexed attempt that just
    /// failed), before jitter: `min(max_delay_ms, delay_ms * multiplier^(attempt-1))`.
    fn base_delay_ms(&self, attempt: u32) -> u64 {
        let raw = self.delay_ms as f64 * self.multiplier.powi(attempt as i32 - 1);
        raw.min(self.max_delay_ms as f64) as u64
    }
}

/// Wraps a fallible zero-argument async operation in classified exponential
/// backoff.
pub struct RetryHandler {
    config: RetryConfig,
}

impl RetryHandler {
    /// Build a handler from the given config.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Run `op` up to `config.max_attempts` times. Retriable failures wait
    /// `delay = min(max_delay_ms, delay_ms * multiplier^(attempt-1))` with
    /// jitter in `[0, delay/2]` before the next attempt. Non-retriable and
    /// fatal errors propagate immediately without waiting. After the final
    /// attempt fails, its error is returned.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt >= self.config.max_attempts || !err.is_retriable() {
                        if attempt >= self.config.max_attempts {
                            warn!("retry: exhausted {} attempts, giving up: {err}", self.config.max_attempts);
                        }
                        return Err(err);
                    }
                    let delay = self.delay_with_jitter(attempt);
                    debug!(
                        "retry: attempt {attempt} failed with retriable error ({err}); \
                         waiting {delay:?} before attempt {}",
                        attempt + 1
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// The wait duration before the next attempt, including jitter in
    /// `[0, delay/2]`.
    fn delay_with_jitter(&self, attempt: u32) -> Duration {
        let base = self.config.base_delay_ms(attempt);
        let jitter = if base == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=base / 2)
        };
        Duration::from_millis(base + jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_retry_succeeds_after_rate_limit_errors() {
        let config = RetryConfig::new(3, 1, 5, 2.0).unwrap();
        let handler = RetryHandler::new(config);
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result = handler
            .run(move || {
                let calls = calls_clone.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(Error::rate_limit("slow down"))
                    } else {
                        Ok("hi".to_string())
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "hi");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_stops_at_max_attempts() {
        let config = RetryConfig::new(3, 1, 5, 2.0).unwrap();
        let handler = RetryHandler::new(config);
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: Result<()> = handler
            .run(move || {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(Error::rate_limit("still busy"))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retriable_error_propagates_immediately() {
        let config = RetryConfig::new(5, 1, 5, 2.0).unwrap();
        let handler = RetryHandler::new(config);
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: Result<()> = handler
            .run(move || {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(Error::config("bad model id"))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_base_delay_grows_exponentially_and_caps() {
        let config = RetryConfig::new(5, 100, 300, 2.0).unwrap();
        assert_eq!(config.base_delay_ms(1), 100);
        assert_eq!(config.base_delay_ms(2), 200);
        assert_eq!(config.base_delay_ms(3), 300); // would be 400, capped at 300
    }

    #[test]
    fn test_zero_max_attempts_rejected() {
        assert!(RetryConfig::new(0, 10, 100, 2.0).is_err());
    }
}
