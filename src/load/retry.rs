//! Retry policy for retryable transport errors

use std::time::Duration;

/// Exponential backoff policy applied between transport tries
///
/// The delay after the n-th failed try (1-based) is
/// `initial_backoff * 2^(n-1)`, capped at `max_backoff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total tries, including the first one
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after the given failed try, or `None` once the policy is
    /// exhausted
    pub fn backoff_after(&self, failed_try: u32) -> Option<Duration> {
        if failed_try == 0 || failed_try >= self.max_attempts {
            return None;
        }

        let exponent = (failed_try - 1).min(31);
        let delay = self
            .initial_backoff
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_backoff);
        Some(delay.min(self.max_backoff))
    }
}
