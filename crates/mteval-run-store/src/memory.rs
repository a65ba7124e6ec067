//! In-memory run store.

use mteval_types::Fingerprint;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::StoreError;
use crate::stored::{Listing, RunState, StoredRun};
use crate::RunStore;

/// [`RunStore`] over a map. Nothing survives the process.
///
/// Writes can be made to fail with [`MemoryRunStore::set_read_only`] to
/// exercise storage-failure paths.
#[derive(Debug, Default)]
pub struct MemoryRunStore {
    entries: RwLock<HashMap<(RunState, Fingerprint), StoredRun>>,
    read_only: AtomicBool,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with a permission error.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Number of entries in a partition.
    pub fn count(&self, state: RunState) -> usize {
        self.entries.read().keys().filter(|(s, _)| *s == state).count()
    }

    fn check_writable(&self, fingerprint: &Fingerprint, state: RunState) -> Result<(), StoreError> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StoreError::io(
                "write entry",
                PathBuf::from(format!("memory://{}/{}", state, fingerprint)),
                io::Error::new(io::ErrorKind::PermissionDenied, "store is read-only"),
            ));
        }
        Ok(())
    }
}

impl RunStore for MemoryRunStore {
    fn put(&self, entry: &StoredRun) -> Result<(), StoreError> {
        self.check_writable(&entry.fingerprint, entry.state)?;
        self.entries
            .write()
            .insert((entry.state, entry.fingerprint.clone()), entry.clone());
        Ok(())
    }

    fn get(
        &self,
        fingerprint: &Fingerprint,
        state: RunState,
    ) -> Result<Option<StoredRun>, StoreError> {
        Ok(self.entries.read().get(&(state, fingerprint.clone())).cloned())
    }

    fn list(&self, state: RunState) -> Result<Listing, StoreError> {
        let entries = self
            .entries
            .read()
            .iter()
            .filter(|((s, _), _)| *s == state)
            .map(|(_, entry)| entry.clone())
            .collect();
        Ok(Listing {
            entries,
            unreadable: Vec::new(),
        })
    }

    fn delete(&self, fingerprint: &Fingerprint, state: RunState) -> Result<(), StoreError> {
        self.check_writable(fingerprint, state)?;
        self.entries.write().remove(&(state, fingerprint.clone()));
        Ok(())
    }

    fn move_entry(
        &self,
        fingerprint: &Fingerprint,
        from: RunState,
        to: RunState,
    ) -> Result<StoredRun, StoreError> {
        self.check_writable(fingerprint, to)?;
        let mut entries = self.entries.write();
        let Some(mut entry) = entries.remove(&(from, fingerprint.clone())) else {
            return Err(StoreError::NotFound {
                fingerprint: fingerprint.clone(),
                state: from,
            });
        };
        entry.state = to;
        entries.insert((to, fingerprint.clone()), entry.clone());
        Ok(entry)
    }
}
