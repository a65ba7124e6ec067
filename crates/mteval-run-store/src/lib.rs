//! Durable local partitions for translation runs.
//!
//! This crate provides:
//! - [`RunStore`]: the partitioned key-value contract, keyed by [`Fingerprint`]
//! - [`FsRunStore`]: one JSON file per run under `<root>/<partition>/`
//! - [`MemoryRunStore`]: the same contract over a map, for tests and dry runs
//!
//! Every write goes through write-temp-then-rename, so a crash never leaves a
//! half-written entry visible to [`RunStore::list`].

pub mod error;
pub mod fs;
pub mod memory;
pub mod paths;
pub mod stored;

pub use error::StoreError;
pub use fs::FsRunStore;
pub use memory::MemoryRunStore;
pub use stored::{FailureKind, Listing, RunState, StoredError, StoredRun, UnreadableEntry};

use mteval_types::{Fingerprint, Run};

/// Partitioned storage for runs awaiting (or past) delivery.
///
/// At most one entry exists per fingerprint per partition: writing an entry
/// whose fingerprint is already present replaces it.
pub trait RunStore: Send + Sync {
    /// Write `entry` into `entry.state`, replacing any entry with the same fingerprint.
    fn put(&self, entry: &StoredRun) -> Result<(), StoreError>;

    /// Load one entry, if present.
    fn get(&self, fingerprint: &Fingerprint, state: RunState)
        -> Result<Option<StoredRun>, StoreError>;

    /// Enumerate a partition. Order is unspecified.
    fn list(&self, state: RunState) -> Result<Listing, StoreError>;

    /// Remove an entry. Absent entries are not an error.
    fn delete(&self, fingerprint: &Fingerprint, state: RunState) -> Result<(), StoreError>;

    /// Atomically relocate an entry from one partition to another, replacing
    /// any entry already at the destination.
    fn move_entry(
        &self,
        fingerprint: &Fingerprint,
        from: RunState,
        to: RunState,
    ) -> Result<StoredRun, StoreError>;

    /// Store `run` in `state`, keeping bookkeeping of an existing entry for the
    /// same content (creation time, attempt count, assigned uuid).
    fn save(&self, run: &Run, state: RunState) -> Result<StoredRun, StoreError> {
        let fingerprint = run.fingerprint();
        let entry = match self.get(&fingerprint, state) {
            Ok(Some(existing)) => existing.with_run(run),
            Ok(None) => StoredRun::new(run.clone(), state),
            Err(StoreError::Corrupt { path, reason }) => {
                tracing::warn!(path = %path.display(), %reason, "replacing unreadable entry");
                StoredRun::new(run.clone(), state)
            }
            Err(e) => return Err(e),
        };
        self.put(&entry)?;
        Ok(entry)
    }

    /// Whether the partition holds an entry for `fingerprint`.
    fn contains(&self, fingerprint: &Fingerprint, state: RunState) -> Result<bool, StoreError> {
        Ok(self.get(fingerprint, state)?.is_some())
    }
}
