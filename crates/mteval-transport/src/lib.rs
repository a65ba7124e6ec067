//! Network transport for delivering runs to the evaluation service.
//!
//! This crate provides:
//! - [`UploadTransport`]: one delivery attempt, classified into an [`Outcome`]
//! - [`http::HttpTransport`]: the ureq-backed implementation
//!
//! Failures are returned as data. Whether an attempt is worth repeating is
//! decided from the [`Outcome`] variant alone, never from error types.
//!
//! # Example
//!
//! ```ignore
//! use mteval_transport::{HttpTransport, UploadTransport};
//!
//! let transport = HttpTransport::new();
//! let outcome = transport.attempt("http://localhost:8000", &run, "api-key");
//! ```

pub mod http;

pub use http::{classify_status, runs_url, HttpTransport, StatusClass};

use mteval_types::Run;
use std::fmt;
use std::time::Duration;

/// Why the service (or the network) did not accept a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// HTTP status, when a response was received at all.
    pub status: Option<u16>,
    pub reason: String,
    /// Server-requested wait before trying again (`Retry-After`).
    pub retry_after: Option<Duration>,
}

impl Rejection {
    pub fn new(status: Option<u16>, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
            retry_after: None,
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {}: {}", status, self.reason),
            None => f.write_str(&self.reason),
        }
    }
}

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The service accepted the run (2xx).
    Delivered {
        status: u16,
        /// Server-assigned run id, when the response carried one.
        remote_id: Option<i64>,
    },
    /// Retrying unchanged will not help (malformed payload, auth, conflict, ...).
    RejectedPermanent(Rejection),
    /// Network failure, timeout, 5xx or rate limit; a later attempt may succeed.
    RejectedTransient(Rejection),
}

impl Outcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Outcome::Delivered { .. })
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Outcome::Delivered { .. } => None,
            Outcome::RejectedPermanent(r) | Outcome::RejectedTransient(r) => Some(r),
        }
    }
}

/// Performs exactly one network round trip per call; callers own repetition.
pub trait UploadTransport: Send + Sync {
    fn attempt(&self, host: &str, run: &Run, api_key: &str) -> Outcome;
}

impl<T: UploadTransport + ?Sized> UploadTransport for &T {
    fn attempt(&self, host: &str, run: &Run, api_key: &str) -> Outcome {
        (**self).attempt(host, run, api_key)
    }
}

impl<T: UploadTransport + ?Sized> UploadTransport for std::sync::Arc<T> {
    fn attempt(&self, host: &str, run: &Run, api_key: &str) -> Outcome {
        (**self).attempt(host, run, api_key)
    }
}
