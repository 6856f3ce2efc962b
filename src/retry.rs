//! Retry helper for calls to upstream services.
//!
//! A fixed attempt count with multiplicative backoff, applied uniformly to
//! every failure. Upstream errors are opaque strings here; classifying them
//! has historically been less reliable than simply retrying.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry policy for upstream API calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total number of attempts (1 = no retry).
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub initial_delay_ms: u64,
    /// Multiplier applied to the delay after each failed attempt.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay before the retry following `attempt` (1-based).
    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        Duration::from_millis((self.initial_delay_ms as f64 * factor) as u64)
    }
}

/// Run `op` until it succeeds or the attempt budget is exhausted.
///
/// Returns the last error when every attempt fails.
pub async fn with_retry<T, E, F, Fut>(config: &RetryConfig, mut op: F) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: std::fmt::Display,
{
    let attempts = config.max_attempts.max(1);
    let mut last_err = None;

    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt < attempts {
                    let delay = config.delay_for(attempt);
                    warn!(
                        "Attempt {}/{} failed: {}. Retrying in {:?}",
                        attempt, attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                last_err = Some(e);
            }
        }
    }

    Err(last_err.expect("at least one attempt was made"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay_ms: 1,
            multiplier: 2.0,
        }
    }

    #[test]
    fn test_delay_is_multiplicative() {
        let config = RetryConfig {
            max_attempts: 3,
            initial_delay_ms: 100,
            multiplier: 3.0,
        };
        assert_eq!(config.delay_for(1), Duration::from_millis(100));
        assert_eq!(config.delay_for(2), Duration::from_millis(300));
        assert_eq!(config.delay_for(3), Duration::from_millis(900));
    }

    #[test]
    fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = tokio_test::block_on(with_retry(&fast_config(3), || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(format!("transient failure {}", n))
                } else {
                    Ok(n)
                }
            }
        }));

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_surfaces_last_error_when_exhausted() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = tokio_test::block_on(with_retry(&fast_config(3), || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Err(format!("failure {}", n)) }
        }));

        assert_eq!(result, Err("failure 3".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_single_attempt_does_not_retry() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = tokio_test::block_on(with_retry(&fast_config(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err("boom".to_string()) }
        }));

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
