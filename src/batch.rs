//! Bulk resubmission of stored runs.

use mteval_run_store::{RunState, StoreError, StoredRun};
use mteval_types::Fingerprint;
use serde::Serialize;
use std::fmt;

use crate::config::UploadOptions;
use crate::orchestrator::{RunStatus, UploadOrchestrator, UploadReport};

/// Which partition a replay walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    /// `pending_failure`: runs never delivered.
    Failed,
    /// `success`: runs delivered before and kept locally.
    Succeeded,
}

impl Selection {
    pub fn state(self) -> RunState {
        match self {
            Selection::Failed => RunState::PendingFailure,
            Selection::Succeeded => RunState::Success,
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Selection::Failed => "failed",
            Selection::Succeeded => "successful",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayOptions {
    pub upload: UploadOptions,
    /// Also resubmit failed runs whose last rejection was permanent.
    pub include_rejected: bool,
}

/// Per-run line of a batch summary.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub fingerprint: Fingerprint,
    pub dataset_name: String,
    pub status: RunResultStatus,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunResultStatus {
    Delivered,
    QueuedForRetry,
    RejectedPermanently,
    Interrupted,
    /// Left alone: last rejection was permanent and `include_rejected` was off.
    SkippedRejected,
}

impl From<RunStatus> for RunResultStatus {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Delivered => RunResultStatus::Delivered,
            RunStatus::QueuedForRetry => RunResultStatus::QueuedForRetry,
            RunStatus::RejectedPermanently => RunResultStatus::RejectedPermanently,
            RunStatus::Interrupted => RunResultStatus::Interrupted,
        }
    }
}

impl fmt::Display for RunResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            RunResultStatus::Delivered => RunStatus::Delivered,
            RunResultStatus::QueuedForRetry => RunStatus::QueuedForRetry,
            RunResultStatus::RejectedPermanently => RunStatus::RejectedPermanently,
            RunResultStatus::Interrupted => RunStatus::Interrupted,
            RunResultStatus::SkippedRejected => return f.write_str("skipped-rejected"),
        };
        fmt::Display::fmt(&status, f)
    }
}

/// Aggregate result of one replay pass.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub selection: Selection,
    /// Readable entries found in the partition.
    pub total: usize,
    pub delivered: usize,
    /// Delivered runs that had been in `pending_failure`.
    pub newly_successful: usize,
    pub queued_for_retry: usize,
    pub rejected_permanently: usize,
    pub skipped_rejected: usize,
    pub interrupted: usize,
    /// Partition files that could not be decoded.
    pub unreadable: usize,
    pub results: Vec<RunResult>,
}

impl BatchSummary {
    fn new(selection: Selection) -> Self {
        Self {
            selection,
            total: 0,
            delivered: 0,
            newly_successful: 0,
            queued_for_retry: 0,
            rejected_permanently: 0,
            skipped_rejected: 0,
            interrupted: 0,
            unreadable: 0,
            results: Vec::new(),
        }
    }

    /// Runs still waiting in `pending_failure` after this pass.
    pub fn still_failed(&self) -> usize {
        self.queued_for_retry + self.rejected_permanently + self.skipped_rejected + self.interrupted
    }

    fn record(&mut self, result: RunResult) {
        match result.status {
            RunResultStatus::Delivered => {
                self.delivered += 1;
                if self.selection == Selection::Failed {
                    self.newly_successful += 1;
                }
            }
            RunResultStatus::QueuedForRetry => self.queued_for_retry += 1,
            RunResultStatus::RejectedPermanently => self.rejected_permanently += 1,
            RunResultStatus::SkippedRejected => self.skipped_rejected += 1,
            RunResultStatus::Interrupted => self.interrupted += 1,
        }
        self.results.push(result);
    }
}

/// Feeds stored runs back through an [`UploadOrchestrator`], one at a time.
pub struct BatchRunner<'a> {
    orchestrator: &'a UploadOrchestrator,
}

impl<'a> BatchRunner<'a> {
    pub fn new(orchestrator: &'a UploadOrchestrator) -> Self {
        Self { orchestrator }
    }

    /// Resubmit every entry of the selected partition, oldest first.
    ///
    /// A run that fails to deliver is recorded in the summary and the pass
    /// continues. Only a [`StoreError`] stops the pass.
    pub fn replay(
        &self,
        selection: Selection,
        options: ReplayOptions,
    ) -> Result<BatchSummary, StoreError> {
        let store = self.orchestrator.store();
        let cancel = self.orchestrator.cancel_token();
        let listing = store.list(selection.state())?;

        let mut summary = BatchSummary::new(selection);
        summary.total = listing.entries.len();
        summary.unreadable = listing.unreadable.len();

        let mut entries = listing.entries;
        entries.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.fingerprint.cmp(&b.fingerprint))
        });

        tracing::info!(
            selection = %selection,
            runs = entries.len(),
            "replaying stored runs"
        );

        for entry in entries {
            if cancel.is_cancelled() {
                summary.record(RunResult {
                    fingerprint: entry.fingerprint.clone(),
                    dataset_name: entry.run.dataset_name.clone(),
                    status: RunResultStatus::Interrupted,
                    attempts: 0,
                    remote_id: None,
                    error: None,
                });
                continue;
            }

            if selection == Selection::Failed && entry.needs_operator() && !options.include_rejected {
                tracing::debug!(
                    fingerprint = %entry.fingerprint.short(),
                    "skipping permanently rejected run"
                );
                summary.record(RunResult {
                    fingerprint: entry.fingerprint.clone(),
                    dataset_name: entry.run.dataset_name.clone(),
                    status: RunResultStatus::SkippedRejected,
                    attempts: 0,
                    remote_id: None,
                    error: entry.last_error.as_ref().map(|e| e.message.clone()),
                });
                continue;
            }

            let entry = self.rekey_if_edited(entry, selection.state())?;
            let report = self.orchestrator.upload(&entry.run, options.upload)?;
            summary.record(result_line(&entry, report));
        }

        tracing::info!(
            selection = %selection,
            delivered = summary.delivered,
            still_failed = summary.still_failed(),
            "replay finished"
        );
        Ok(summary)
    }

    /// Move an entry whose run was edited in place to its new fingerprint.
    fn rekey_if_edited(&self, entry: StoredRun, state: RunState) -> Result<StoredRun, StoreError> {
        let actual = entry.run.fingerprint();
        if actual == entry.fingerprint {
            return Ok(entry);
        }
        let store = self.orchestrator.store();
        let old = entry.fingerprint.clone();
        tracing::info!(from = %old.short(), to = %actual.short(), "run content changed; re-keying entry");

        let mut moved = entry;
        moved.fingerprint = actual;
        moved.last_error = None;
        store.put(&moved)?;
        store.delete(&old, state)?;
        Ok(moved)
    }
}

fn result_line(entry: &StoredRun, report: UploadReport) -> RunResult {
    RunResult {
        fingerprint: report.fingerprint,
        dataset_name: entry.run.dataset_name.clone(),
        status: report.status.into(),
        attempts: report.attempts,
        remote_id: report.remote_id,
        error: report.error.map(|e| e.to_string()),
    }
}
