//! MT-evaluation run uploader
//!
//! Delivers translation runs to the evaluation service without losing them
//! to flaky networks or interrupted processes:
//!
//! - **Upload**: [`UploadOrchestrator`] drives one run to delivery with bounded retries
//! - **Replay**: [`BatchRunner`] resubmits runs left in the local partitions
//! - **Storage**: [`mteval_run_store`] keeps runs durably, keyed by content fingerprint
//! - **Transport**: [`mteval_transport`] classifies each attempt as delivered, transient or permanent
//!
//! Configuration is passed in explicitly ([`DeliveryTarget`], [`RetryPolicy`],
//! a store root), so several configurations can coexist in one process.

pub mod batch;
pub mod cancel;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod retry;

pub use batch::{BatchRunner, BatchSummary, ReplayOptions, RunResult, RunResultStatus, Selection};
pub use cancel::CancelToken;
pub use config::{default_data_dir, DeliveryTarget, UploadConfig, UploadOptions};
pub use error::DeliveryError;
pub use orchestrator::{RunStatus, UploadOrchestrator, UploadReport};
pub use retry::RetryPolicy;

pub use mteval_run_store::{
    FailureKind, FsRunStore, Listing, MemoryRunStore, RunState, RunStore, StoreError, StoredError,
    StoredRun,
};
pub use mteval_transport::{HttpTransport, Outcome, Rejection, UploadTransport};
pub use mteval_types::{fingerprint, Fingerprint, RetryConfig, Run, Segment};
