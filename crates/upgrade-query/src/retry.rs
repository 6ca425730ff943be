//! Automatic retry policy for query fetches
//!
//! Back-off doubles with each retry: 1s → 2s → 4s → ... → 30s (max).
//! Mutations never retry automatically.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy with exponential back-off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Automatic retries after the first failed attempt
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds
    pub initial_backoff_ms: u64,
    /// Upper bound on any single delay in milliseconds
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with custom settings
    #[inline]
    #[must_use]
    pub fn new(max_retries: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff_ms,
            max_backoff_ms: max_backoff_ms.max(initial_backoff_ms),
        }
    }

    /// Policy that settles on the first failure
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// With retry count
    #[inline]
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Whether another attempt is allowed after `failures` failed attempts
    #[inline]
    #[must_use]
    pub fn should_retry(&self, failures: u32) -> bool {
        failures <= self.max_retries
    }

    /// Delay before retry number `retry` (zero-based)
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64.checked_shl(retry).unwrap_or(u64::MAX);
        let delay = self.initial_backoff_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_backoff_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_retries_once() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(1));
        assert!(!policy.should_retry(2));
    }

    #[test]
    fn none_never_retries() {
        assert!(!RetryPolicy::none().should_retry(1));
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(4), Duration::from_secs(16));
        assert_eq!(policy.backoff(5), Duration::from_secs(30));
        assert_eq!(policy.backoff(200), Duration::from_secs(30));
    }

    #[test]
    fn max_backoff_never_below_initial() {
        let policy = RetryPolicy::new(3, 5_000, 100);
        assert_eq!(policy.backoff(0), Duration::from_secs(5));
    }
}
