//! Exponential backoff with jitter for transient provider failures.

use brandforge_config::{MAX_RETRY_DELAY_SECS, RetryConfig};
use rand::Rng;
use std::time::Duration;

/// Lower and upper bound of the jitter fraction added to each delay.
const JITTER_RANGE: (f64, f64) = (0.1, 0.3);

/// How often and how long the gateway waits before re-issuing a call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    /// Out-of-range delays fall back to the defaults; `AppConfig::validate`
    /// reports them before a policy is ever built.
    fn from(config: &RetryConfig) -> Self {
        let defaults = Self::default();
        let secs = |value: f64, fallback: Duration| {
            Duration::try_from_secs_f64(value.clamp(0.0, MAX_RETRY_DELAY_SECS)).unwrap_or(fallback)
        };
        Self {
            max_retries: config.max_retries,
            base_delay: secs(config.base_delay_secs, defaults.base_delay),
            max_delay: secs(config.max_delay_secs, defaults.max_delay),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// A policy that never waits, for tests and offline runs.
    pub fn immediate(max_retries: u32) -> Self {
        Self::new(max_retries, Duration::ZERO, Duration::ZERO)
    }

    /// Capped exponential delay for retry `attempt` (0-based), before jitter.
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let factor = 2f64.powi(attempt.min(62) as i32);
        let secs = (self.base_delay.as_secs_f64() * factor).min(self.max_delay.as_secs_f64());
        Duration::try_from_secs_f64(secs).unwrap_or(self.max_delay)
    }

    /// Delay before retry `attempt`: the capped base plus 10-30% jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let jitter = rand::rng().random_range(JITTER_RANGE.0..=JITTER_RANGE.1);
        let base = self.base_delay_for(attempt);
        Duration::try_from_secs_f64(base.as_secs_f64() * (1.0 + jitter)).unwrap_or(base)
    }
}
