use std::time::Duration;

use crate::throttle::sample_jitter;

/// Bounded exponential backoff for upstream calls.
///
/// `max_attempts` counts every call, the first one included. The wait after
/// failed attempt `n` (zero based) is `base_delay * 2^n`, capped at
/// `max_backoff`, plus a jitter sample in `[0, jitter)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_backoff: Duration,
    pub jitter: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: if max_attempts == 0 { 1 } else { max_attempts },
            base_delay,
            max_backoff: Duration::from_secs(60),
            jitter: Duration::from_secs(2),
        }
    }

    #[must_use]
    pub const fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    #[must_use]
    pub const fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// True when another attempt is allowed after `attempts_made` calls.
    #[must_use]
    pub const fn allows_another(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }

    /// The deterministic part of the wait after failed attempt `attempt`.
    #[must_use]
    pub fn base_backoff(&self, attempt: u32) -> Duration {
        let factor = 1_u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_backoff)
    }

    /// Wait after failed attempt `attempt`, given a jitter fraction in `[0, 1)`.
    #[must_use]
    pub fn backoff_with_fraction(&self, attempt: u32, fraction: f64) -> Duration {
        self.base_backoff(attempt) + self.jitter.mul_f64(fraction.clamp(0.0, 1.0))
    }

    /// Wait after failed attempt `attempt` with a fresh jitter sample.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff(attempt) + sample_jitter(self.jitter)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(5))
    }
}
