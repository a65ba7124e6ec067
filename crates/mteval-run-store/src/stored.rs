//! Stored entries and their delivery bookkeeping.

use chrono::{DateTime, Utc};
use mteval_types::{Fingerprint, Run};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Storage partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Not yet delivered (or last delivery attempt failed).
    PendingFailure,
    /// Delivered, kept locally on request.
    Success,
}

impl RunState {
    pub const ALL: [RunState; 2] = [RunState::PendingFailure, RunState::Success];

    /// Directory name of the partition under the store root.
    pub fn dir_name(self) -> &'static str {
        match self {
            RunState::PendingFailure => "pending_failure",
            RunState::Success => "success",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Why the last delivery of an entry did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Network error, timeout, 5xx or rate limit; a later attempt may succeed.
    Transient,
    /// Transient failures until the retry budget of a call ran out.
    ExhaustedRetries,
    /// The service refused the run; resubmitting unchanged will not help.
    Permanent,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureKind::Transient => "transient",
            FailureKind::ExhaustedRetries => "exhausted_retries",
            FailureKind::Permanent => "permanent",
        })
    }
}

/// Recorded failure detail, kept for operator inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredError {
    pub kind: FailureKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub at: DateTime<Utc>,
}

impl StoredError {
    pub fn new(kind: FailureKind, message: impl Into<String>, status: Option<u16>) -> Self {
        Self {
            kind,
            message: message.into(),
            status,
            at: Utc::now(),
        }
    }
}

/// A run plus delivery bookkeeping, as persisted in a partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRun {
    pub fingerprint: Fingerprint,
    pub state: RunState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Transport attempts across every upload call for this run.
    pub attempt_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<StoredError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
    pub run: Run,
}

impl StoredRun {
    pub fn new(run: Run, state: RunState) -> Self {
        let now = Utc::now();
        Self {
            fingerprint: run.fingerprint(),
            state,
            created_at: now,
            updated_at: now,
            attempt_count: 0,
            last_error: None,
            delivered_at: None,
            run,
        }
    }

    /// Replace the payload, keeping bookkeeping and any assigned uuid.
    pub fn with_run(mut self, run: &Run) -> Self {
        let uuid = run.uuid.clone().or_else(|| self.run.uuid.take());
        self.run = run.clone();
        self.run.uuid = uuid;
        self.updated_at = Utc::now();
        self
    }

    /// Count one more transport attempt that did not deliver.
    pub fn record_failure(&mut self, error: StoredError) {
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.updated_at = error.at;
        self.last_error = Some(error);
    }

    /// Count the delivering attempt and clear the error.
    pub fn record_delivery(&mut self) {
        let now = Utc::now();
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.last_error = None;
        self.delivered_at = Some(now);
        self.updated_at = now;
    }

    /// Permanently rejected entries wait for an operator instead of blind replay.
    pub fn needs_operator(&self) -> bool {
        matches!(
            self.last_error,
            Some(StoredError {
                kind: FailureKind::Permanent,
                ..
            })
        )
    }
}

/// A partition entry that exists but could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadableEntry {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of enumerating a partition.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    pub entries: Vec<StoredRun>,
    pub unreadable: Vec<UnreadableEntry>,
}

impl Listing {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mteval_types::Segment;

    fn run() -> Run {
        Run::new("ns", "ds", "en", "fr", vec![Segment::new("Hello", "Bonjour")])
    }

    #[test]
    fn test_bookkeeping() {
        let mut entry = StoredRun::new(run(), RunState::PendingFailure);
        assert_eq!(entry.attempt_count, 0);
        assert!(!entry.needs_operator());

        entry.record_failure(StoredError::new(FailureKind::Transient, "503", Some(503)));
        assert_eq!(entry.attempt_count, 1);
        assert!(!entry.needs_operator());

        entry.record_failure(StoredError::new(FailureKind::Permanent, "422", Some(422)));
        assert_eq!(entry.attempt_count, 2);
        assert!(entry.needs_operator());

        entry.record_delivery();
        assert_eq!(entry.attempt_count, 3);
        assert!(entry.last_error.is_none());
        assert!(entry.delivered_at.is_some());
    }

    #[test]
    fn test_with_run_keeps_assigned_uuid() {
        let entry = StoredRun::new(run().with_uuid_if_missing("u-1"), RunState::PendingFailure);
        let replaced = entry.with_run(&run());
        assert_eq!(replaced.run.uuid.as_deref(), Some("u-1"));

        let explicit = replaced.with_run(&run().with_uuid_if_missing("u-2"));
        assert_eq!(explicit.run.uuid.as_deref(), Some("u-2"));
    }

    #[test]
    fn test_json_shape() {
        let entry = StoredRun::new(run(), RunState::PendingFailure);
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["state"], "pending_failure");
        assert_eq!(value["fingerprint"], entry.fingerprint.as_str());
        assert!(value.get("last_error").is_none());

        let back: StoredRun = serde_json::from_value(value).unwrap();
        assert_eq!(back, entry);
    }
}
