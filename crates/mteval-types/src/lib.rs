//! Shared types for the mteval-upload workspace.
//!
//! - [`run`]: the [`Run`] payload delivered to the evaluation service
//! - [`fingerprint`]: content-derived run identity used as the storage key
//! - [`RetryConfig`]: knobs for the upload retry loop
//! - [`env_utils`]: environment variable parsing helpers

pub mod env_utils;
pub mod fingerprint;
pub mod run;

pub use fingerprint::{canonical_json, fingerprint, Fingerprint, FingerprintError};
pub use run::{InvalidRun, Run, Segment};

use std::time::Duration;

/// Configuration for retry behavior on upload attempts.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of transport attempts within one upload call (>= 1).
    pub max_attempts: u32,
    /// Backoff before the second attempt.
    pub initial_backoff: Duration,
    /// Upper bound for any single wait.
    pub max_backoff: Duration,
    /// Add random jitter in `[0, delay]` to each wait.
    pub jitter: bool,
}

impl RetryConfig {
    /// Create a new RetryConfig with the specified parameters.
    pub fn new(max_attempts: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff: Duration::from_millis(initial_backoff_ms),
            max_backoff: Duration::from_millis(max_backoff_ms.max(initial_backoff_ms)),
            jitter: true,
        }
    }

    /// Same config with jitter disabled (deterministic waits).
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(10),
            jitter: true,
        }
    }
}
