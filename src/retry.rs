//! Retry policy for upload attempts.
//!
//! Exponential backoff: the wait after attempt `n` is `base * 2^(n-1)` plus
//! random jitter in `[0, base * 2^(n-1)]`, capped at `max_backoff`. Because
//! each uncapped window `[b * 2^(n-1), b * 2^n]` starts where the previous one
//! ends, the waits of one call never decrease.

use mteval_transport::{Outcome, Rejection};
use mteval_types::RetryConfig;
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts.max(1)
    }

    /// `min(base * 2^(attempt_number-1), max_backoff)`, without jitter.
    pub fn base_delay(&self, attempt_number: u32) -> Duration {
        let exponent = attempt_number.saturating_sub(1);
        let factor = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
        self.config
            .initial_backoff
            .saturating_mul(factor)
            .min(self.config.max_backoff)
    }

    /// Wait before the attempt following `attempt_number`.
    pub fn next_delay(&self, attempt_number: u32) -> Duration {
        let delay = self.base_delay(attempt_number);
        if !self.config.jitter || delay.is_zero() {
            return delay;
        }
        let span = u64::try_from(delay.as_nanos()).unwrap_or(u64::MAX);
        let jitter = Duration::from_nanos(rand::thread_rng().gen_range(0..=span));
        delay.saturating_add(jitter).min(self.config.max_backoff)
    }

    /// Wait before retrying after `rejection`, honoring a server `Retry-After`
    /// hint up to `max_backoff`.
    pub fn delay_for(&self, attempt_number: u32, rejection: &Rejection) -> Duration {
        let delay = self.next_delay(attempt_number);
        match rejection.retry_after {
            Some(hint) => delay.max(hint.min(self.config.max_backoff)),
            None => delay,
        }
    }

    /// Whether attempt `attempt_number + 1` should happen after `outcome`.
    pub fn should_retry(&self, attempt_number: u32, outcome: &Outcome) -> bool {
        match outcome {
            Outcome::RejectedTransient(_) => attempt_number < self.max_attempts(),
            Outcome::Delivered { .. } | Outcome::RejectedPermanent(_) => false,
        }
    }
}
