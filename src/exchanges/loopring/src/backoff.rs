use crate::config::BackoffConfig;
use rand::random;
use std::time::Duration;

/// Exponential reconnect delay. The first attempt after a reset is immediate, every further
/// attempt doubles the delay up to `max`.
pub struct Backoff {
    config: BackoffConfig,
    attempt: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Backoff {
        Backoff { config, attempt: 0 }
    }

    pub fn next_delay(&mut self) -> Duration {
        let attempt = self.attempt;
        self.attempt = self.attempt.saturating_add(1);

        if attempt == 0 {
            return Duration::ZERO;
        }

        let factor = 2u32.saturating_pow(attempt - 1);
        let base = self
            .config
            .initial
            .saturating_mul(factor)
            .min(self.config.max);

        if self.config.jitter > 0.0 {
            base.mul_f64(1.0 + self.config.jitter * random::<f64>())
        } else {
            base
        }
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
