//! Explicit configuration threaded through the orchestrator and batch runner.

use mteval_run_store::{FsRunStore, StoreError};
use mteval_transport::HttpTransport;
use mteval_types::env_utils::env_var;
use mteval_types::RetryConfig;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::orchestrator::UploadOrchestrator;
use crate::retry::RetryPolicy;

/// Application directory name under the platform data directory.
pub const APP_DIR_NAME: &str = "vp-mteval";

/// Where runs are delivered, and with which credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct DeliveryTarget {
    /// Base URL of the evaluation service, e.g. `http://localhost:8000`.
    pub host: String,
    pub api_key: String,
}

impl DeliveryTarget {
    pub fn new(host: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            api_key: api_key.into(),
        }
    }
}

impl fmt::Debug for DeliveryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryTarget")
            .field("host", &self.host)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// What happens to the local copy of a run once it is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOptions {
    /// Keep a copy in the `success` partition after delivery.
    pub keep: bool,
    /// Allow writing a success copy at all; `keep` has no effect without it.
    pub save: bool,
}

impl UploadOptions {
    pub fn keep(keep: bool) -> Self {
        Self { keep, save: true }
    }

    /// Whether a delivered run ends up in the `success` partition.
    pub fn keeps_success_copy(&self) -> bool {
        self.save && self.keep
    }
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self::keep(false)
    }
}

/// Everything one CLI invocation needs to deliver runs.
///
/// HTTP timeouts come from `MTEVAL_HTTP_TIMEOUT_SECS` and
/// `MTEVAL_HTTP_CONNECT_TIMEOUT_SECS`.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub target: DeliveryTarget,
    pub data_dir: PathBuf,
    pub retry: RetryConfig,
}

impl UploadConfig {
    pub fn new(target: DeliveryTarget, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            target,
            data_dir: data_dir.into(),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Open the store under `data_dir` and wire it to the HTTP transport.
    pub fn orchestrator(&self, cancel: CancelToken) -> Result<UploadOrchestrator, StoreError> {
        let store = FsRunStore::open(&self.data_dir)?;
        Ok(UploadOrchestrator::new(
            Arc::new(store),
            Arc::new(HttpTransport::new()),
            self.target.clone(),
            RetryPolicy::new(self.retry),
        )
        .with_cancel(cancel))
    }
}

/// Store root: `MTEVAL_DATA_DIR` if set, else `<platform data dir>/vp-mteval`.
pub fn default_data_dir() -> Option<PathBuf> {
    env_var::<PathBuf>("MTEVAL_DATA_DIR").or_else(|| dirs::data_dir().map(|d| d.join(APP_DIR_NAME)))
}
