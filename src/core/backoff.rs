use std::time::Duration;

use super::types::BackoffConfig;

/// Attempt-counted exponential backoff with a ceiling.
///
/// The delay for a given attempt is `min(base * 2^attempt, max)`, so with the
/// default 1s/30s bounds attempts 0..5 wait 1s, 2s, 4s, 8s, 16s, 30s. The
/// counter only grows while disconnected and resets on a successful open (or
/// a manual reconnect request).
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
    attempt: u32,
}

impl ExponentialBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            attempt: 0,
        }
    }

    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new(config.base, config.max)
    }

    /// Pure delay schedule, exposed so tests can assert exact values.
    pub fn delay_for(base: Duration, max: Duration, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        base.saturating_mul(factor).min(max)
    }

    /// Delay to wait before the next attempt; advances the counter.
    pub fn next_delay(&mut self) -> Duration {
        let delay = Self::delay_for(self.base, self.max, self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Failed attempts taken since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::from_config(&BackoffConfig::default())
    }
}
