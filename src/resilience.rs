// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Resilience utilities: retry with exponential backoff.
//!
//! Engine and discovery reads are idempotent, so a transient failure
//! (connection reset, timeout, 5xx) is retried a few times before the error
//! escapes and takes the controller down. Writes (create/delete) are never
//! retried here; the next reconciliation cycle repairs whatever they missed.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> replication_manager::Result<()> {
//! use replication_manager::resilience::{retry, RetryConfig};
//!
//! let ids = retry(&RetryConfig::default(), "enumerate", || async {
//!     Ok::<_, replication_manager::ReplicationError>(vec!["a".to_string()])
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Configuration for request retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first one).
    pub max_attempts: usize,

    /// Initial delay before first retry.
    pub initial_delay: Duration,

    /// Maximum delay between retries (ceiling for exponential backoff).
    pub max_delay: Duration,

    /// Backoff multiplier (e.g., 2.0 = double delay each retry).
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    /// No retries at all: the first error is returned.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Fast-fail retry for tests.
    pub fn testing() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            backoff_factor: 2.0,
        }
    }

    /// Calculate delay for a given attempt number (1-indexed).
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return self.initial_delay;
        }

        let multiplier = self.backoff_factor.powi((attempt - 1) as i32);
        let delay_secs = self.initial_delay.as_secs_f64() * multiplier;
        let delay = Duration::from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64()));

        std::cmp::min(delay, self.max_delay)
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or runs
/// out of attempts. The last error is returned.
pub async fn retry<T, F, Fut>(config: &RetryConfig, operation: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = config.delay_for_attempt(attempt);
                warn!(
                    operation,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying engine request"
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
    use crate::error::ReplicationError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_delay_for_attempt() {
        let config = RetryConfig {
            max_attempts: 10,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            backoff_factor: 2.0,
        };

        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(4));
        assert_eq!(config.delay_for_attempt(4), Duration::from_secs(8));
        // Capped
        assert_eq!(config.delay_for_attempt(5), Duration::from_secs(10));
        assert_eq!(config.delay_for_attempt(60), Duration::from_secs(10));
    }

    #[test]
    fn test_none_has_single_attempt() {
        assert_eq!(RetryConfig::none().max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_from_transient_errors() {
        let calls = AtomicUsize::new(0);
        let result = retry(&RetryConfig::testing(), "get", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ReplicationError::http_msg("get", "reset"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_after_max_attempts() {
        let calls = AtomicUsize::new(0);
        let result: Result<()> = retry(&RetryConfig::testing(), "get", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ReplicationError::http_msg("get", "reset")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_does_not_retry_permanent_errors() {
        let calls = AtomicUsize::new(0);
        let result: Result<()> = retry(&RetryConfig::testing(), "get", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ReplicationError::NotFound("x".into())) }
        })
        .await;

        assert!(result.unwrap_err().is_not_found());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
