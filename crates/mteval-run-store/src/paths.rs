//! Path utilities for the partition layout.
//!
//! ```text
//! <root>/
//!   pending_failure/<fingerprint>.json
//!   success/<fingerprint>.json
//! ```

use mteval_types::Fingerprint;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::StoreError;
use crate::stored::RunState;

const ENTRY_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "tmp";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Directory of a partition.
pub fn partition_dir(root: &Path, state: RunState) -> PathBuf {
    root.join(state.dir_name())
}

/// File holding the entry for `fingerprint` in `state`.
pub fn entry_path(root: &Path, state: RunState, fingerprint: &Fingerprint) -> PathBuf {
    partition_dir(root, state).join(format!("{}.{}", fingerprint, ENTRY_EXTENSION))
}

/// Whether `path` names a committed entry file (not a temp file).
pub fn is_entry_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(ENTRY_EXTENSION)
}

/// Whether `path` is a temp file left by an interrupted write.
pub fn is_temp_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(TEMP_EXTENSION)
}

/// Ensure all parent directories exist for a path.
pub fn ensure_parent_dirs(path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::io("create directory", parent, e))?;
    }
    Ok(())
}

/// Write a file atomically: write a uniquely named temp file in the same
/// directory, flush it to disk, then rename over the destination.
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    ensure_parent_dirs(path)?;
    let tmp_path = temp_path_for(path);

    let result = (|| {
        let mut file =
            File::create(&tmp_path).map_err(|e| StoreError::io("create temp file", &tmp_path, e))?;
        file.write_all(contents)
            .map_err(|e| StoreError::io("write temp file", &tmp_path, e))?;
        file.sync_all()
            .map_err(|e| StoreError::io("sync temp file", &tmp_path, e))?;
        fs::rename(&tmp_path, path).map_err(|e| StoreError::io("rename temp file onto", path, e))
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
        return result;
    }
    if let Some(parent) = path.parent() {
        sync_dir(parent)?;
    }
    Ok(())
}

/// Write a JSON file atomically (pretty printed, for operator inspection).
pub fn atomic_write_json<T: serde::Serialize>(
    path: &Path,
    value: &T,
    fingerprint: &Fingerprint,
) -> Result<(), StoreError> {
    let json = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Encode {
        fingerprint: fingerprint.clone(),
        source,
    })?;
    atomic_write(path, &json)
}

/// Persist a rename or unlink in `dir` itself.
#[cfg(unix)]
pub fn sync_dir(dir: &Path) -> Result<(), StoreError> {
    File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| StoreError::io("sync directory", dir, e))
}

#[cfg(not(unix))]
pub fn sync_dir(_dir: &Path) -> Result<(), StoreError> {
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("entry");
    let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(
        ".{}.{}.{}.{}",
        name,
        std::process::id(),
        seq,
        TEMP_EXTENSION
    ))
}
