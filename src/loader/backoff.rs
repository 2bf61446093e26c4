//! Retry backoff policy.

use std::time::Duration;

/// Linear-multiple backoff: attempt `n` waits `base * n`, so consecutive
/// delays are strictly increasing until the ceiling is reached.
#[derive(Debug, Clone, Copy)]
pub struct RetryBackoff {
    base: Duration,
    max_retries: u32,
}

impl RetryBackoff {
    pub fn new(base_ms: u64, max_retries: u32) -> Self {
        Self {
            base: Duration::from_millis(base_ms),
            max_retries,
        }
    }

    /// Delay before retry attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(attempt.max(1))
    }

    /// Whether `attempt` failures exhaust the automatic retry budget.
    pub fn is_exhausted(&self, attempt: u32) -> bool {
        attempt >= self.max_retries
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}
