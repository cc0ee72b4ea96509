//! Retry backoff for rate-limited page requests

use crate::types::BackoffType;
use std::time::Duration;

/// Delay schedule for retrying a rate-limited request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Growth strategy
    pub backoff_type: BackoffType,
    /// Delay after the first rate-limited attempt
    pub base: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Total requests allowed for one page, including the first
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            backoff_type: BackoffType::Exponential,
            base: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            max_attempts: 5,
        }
    }
}

impl BackoffPolicy {
    /// Create an exponential policy
    pub fn exponential(base: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            max_attempts,
            ..Self::default()
        }
    }

    /// Set the backoff type
    #[must_use]
    pub fn with_type(mut self, backoff_type: BackoffType) -> Self {
        self.backoff_type = backoff_type;
        self
    }

    /// Set the delay cap
    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay to wait after the rate-limited attempt numbered `attempt` (0-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let delay = match self.backoff_type {
            BackoffType::Constant => Some(self.base),
            BackoffType::Linear => self.base.checked_mul(attempt.saturating_add(1)),
            BackoffType::Exponential => self.base.checked_mul(2u32.saturating_pow(attempt)),
        };

        delay.map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// All delays a fully rate-limited page would wait, in order
    pub fn schedule(&self) -> Vec<Duration> {
        (0..self.max_attempts.saturating_sub(1))
            .map(|attempt| self.delay(attempt))
            .collect()
    }
}
