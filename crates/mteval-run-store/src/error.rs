use std::io;
use std::path::PathBuf;

use mteval_types::Fingerprint;
use thiserror::Error;

use crate::stored::RunState;

/// Local storage failure.
///
/// Any of these means the durability of a run can no longer be vouched for, so
/// callers abort the current operation instead of continuing.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode entry {fingerprint}: {source}")]
    Encode {
        fingerprint: Fingerprint,
        #[source]
        source: serde_json::Error,
    },

    #[error("unreadable entry {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("no {state} entry for {fingerprint}")]
    NotFound {
        fingerprint: Fingerprint,
        state: RunState,
    },
}

impl StoreError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}
