//! Filesystem-backed run store.

use mteval_types::Fingerprint;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::StoreError;
use crate::paths::{
    atomic_write_json, entry_path, is_entry_file, is_temp_file, partition_dir, sync_dir,
};
use crate::stored::{Listing, RunState, StoredRun, UnreadableEntry};
use crate::RunStore;

/// Directory-of-files run store: `<root>/<partition>/<fingerprint>.json`.
///
/// The partition directory an entry lives in is authoritative for its state;
/// the `state` field inside the file is informational.
#[derive(Debug, Clone)]
pub struct FsRunStore {
    root: Arc<Path>,
}

impl FsRunStore {
    /// Open (creating if needed) a store rooted at `root`.
    ///
    /// Temp files left behind by writes interrupted in an earlier process are
    /// removed; the entries they were meant to replace are untouched.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        for state in RunState::ALL {
            let dir = partition_dir(&root, state);
            fs::create_dir_all(&dir).map_err(|e| StoreError::io("create directory", &dir, e))?;
        }
        let store = Self {
            root: Arc::from(root),
        };
        let removed = store.sweep_temp_files()?;
        if removed > 0 {
            tracing::info!(removed, root = %store.root.display(), "removed interrupted writes");
        }
        Ok(store)
    }

    /// Get the store root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn sweep_temp_files(&self) -> Result<usize, StoreError> {
        let mut removed = 0;
        for state in RunState::ALL {
            for path in self.dir_entries(state)? {
                if is_temp_file(&path) {
                    fs::remove_file(&path).map_err(|e| StoreError::io("remove temp file", &path, e))?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    fn dir_entries(&self, state: RunState) -> Result<Vec<PathBuf>, StoreError> {
        let dir = partition_dir(&self.root, state);
        let read_dir = match fs::read_dir(&dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io("read directory", &dir, e)),
        };
        let mut paths = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| StoreError::io("read directory", &dir, e))?;
            paths.push(entry.path());
        }
        Ok(paths)
    }

    fn load(&self, path: &Path, state: RunState) -> Result<Option<StoredRun>, StoreError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io("read entry", path, e)),
        };
        let mut entry: StoredRun =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        if stem != entry.fingerprint.as_str() {
            return Err(StoreError::Corrupt {
                path: path.to_path_buf(),
                reason: format!("file name does not match fingerprint {}", entry.fingerprint),
            });
        }
        entry.state = state;
        Ok(Some(entry))
    }
}

impl RunStore for FsRunStore {
    fn put(&self, entry: &StoredRun) -> Result<(), StoreError> {
        let path = entry_path(&self.root, entry.state, &entry.fingerprint);
        atomic_write_json(&path, entry, &entry.fingerprint)?;
        tracing::debug!(
            fingerprint = %entry.fingerprint,
            state = %entry.state,
            attempts = entry.attempt_count,
            "stored run"
        );
        Ok(())
    }

    fn get(
        &self,
        fingerprint: &Fingerprint,
        state: RunState,
    ) -> Result<Option<StoredRun>, StoreError> {
        self.load(&entry_path(&self.root, state, fingerprint), state)
    }

    fn list(&self, state: RunState) -> Result<Listing, StoreError> {
        let mut listing = Listing::default();
        for path in self.dir_entries(state)? {
            if !is_entry_file(&path) {
                continue;
            }
            match self.load(&path, state) {
                Ok(Some(entry)) => listing.entries.push(entry),
                // Removed between read_dir and read.
                Ok(None) => {}
                Err(StoreError::Corrupt { path, reason }) => {
                    tracing::warn!(path = %path.display(), %reason, "skipping unreadable entry");
                    listing.unreadable.push(UnreadableEntry { path, reason });
                }
                Err(e) => return Err(e),
            }
        }
        Ok(listing)
    }

    fn delete(&self, fingerprint: &Fingerprint, state: RunState) -> Result<(), StoreError> {
        let path = entry_path(&self.root, state, fingerprint);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(%fingerprint, %state, "deleted run");
                sync_dir(&partition_dir(&self.root, state))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io("delete entry", &path, e)),
        }
    }

    fn move_entry(
        &self,
        fingerprint: &Fingerprint,
        from: RunState,
        to: RunState,
    ) -> Result<StoredRun, StoreError> {
        let src = entry_path(&self.root, from, fingerprint);
        let Some(mut entry) = self.load(&src, from)? else {
            return Err(StoreError::NotFound {
                fingerprint: fingerprint.clone(),
                state: from,
            });
        };
        if from == to {
            return Ok(entry);
        }

        let dst = entry_path(&self.root, to, fingerprint);
        fs::rename(&src, &dst).map_err(|e| StoreError::io("move entry to", &dst, e))?;
        sync_dir(&partition_dir(&self.root, to))?;
        sync_dir(&partition_dir(&self.root, from))?;

        // The rename already committed the move; refresh the informational field.
        entry.state = to;
        self.put(&entry)?;
        tracing::debug!(%fingerprint, %from, %to, "moved run");
        Ok(entry)
    }
}
