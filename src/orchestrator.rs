//! Delivery of a single run.
//!
//! One `upload` call walks `Attempting -> {Delivered, ExhaustedRetries}`:
//!
//! 1. The run is written ahead to `pending_failure` (reusing the bookkeeping and
//!    submission uuid of an earlier entry for the same content).
//! 2. Each transport attempt that fails is recorded in that entry before any
//!    wait, so a process killed mid-backoff leaves the run queued exactly once.
//! 3. On delivery the entry is moved to `success` (keep) or deleted from both
//!    partitions (no keep).
//!
//! Every exit path either confirms delivery or leaves the run in
//! `pending_failure`. Only a [`StoreError`] escapes as `Err`.

use mteval_run_store::{FailureKind, RunState, RunStore, StoreError, StoredError, StoredRun};
use mteval_transport::{Outcome, Rejection, UploadTransport};
use mteval_types::{Fingerprint, Run};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::config::{DeliveryTarget, UploadOptions};
use crate::error::DeliveryError;
use crate::retry::RetryPolicy;

/// Final disposition of one upload call, as reported to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    Delivered,
    /// Failed transiently; saved locally for `upload-failed`.
    QueuedForRetry,
    /// Refused by the service; saved locally with the reason.
    RejectedPermanently,
    /// Cancelled before delivery; saved locally for `upload-failed`.
    Interrupted,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunStatus::Delivered => "delivered",
            RunStatus::QueuedForRetry => "queued-for-retry",
            RunStatus::RejectedPermanently => "rejected-permanently",
            RunStatus::Interrupted => "interrupted",
        })
    }
}

/// What one `upload` call did.
#[derive(Debug, Clone)]
pub struct UploadReport {
    pub fingerprint: Fingerprint,
    pub status: RunStatus,
    /// Transport attempts made by this call.
    pub attempts: u32,
    /// Waits between consecutive attempts, in order.
    pub delays: Vec<Duration>,
    /// Server-assigned run id on delivery.
    pub remote_id: Option<i64>,
    /// Partition the run rests in afterwards (`None`: not stored).
    pub stored_in: Option<RunState>,
    pub error: Option<DeliveryError>,
}

impl UploadReport {
    pub fn is_delivered(&self) -> bool {
        self.status == RunStatus::Delivered
    }
}

/// Composes store, transport and retry policy to deliver runs.
pub struct UploadOrchestrator {
    store: Arc<dyn RunStore>,
    transport: Arc<dyn UploadTransport>,
    target: DeliveryTarget,
    policy: RetryPolicy,
    cancel: CancelToken,
}

impl UploadOrchestrator {
    pub fn new(
        store: Arc<dyn RunStore>,
        transport: Arc<dyn UploadTransport>,
        target: DeliveryTarget,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            transport,
            target,
            policy,
            cancel: CancelToken::new(),
        }
    }

    /// Honor `cancel` before attempts and during waits.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn store(&self) -> &Arc<dyn RunStore> {
        &self.store
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Deliver `run`, retrying transient failures per the policy.
    pub fn upload(&self, run: &Run, options: UploadOptions) -> Result<UploadReport, StoreError> {
        let mut entry = self.write_ahead(run)?;
        let payload = entry.run.clone();
        let fingerprint = entry.fingerprint.clone();
        let mut report = UploadReport {
            fingerprint: fingerprint.clone(),
            status: RunStatus::QueuedForRetry,
            attempts: 0,
            delays: Vec::new(),
            remote_id: None,
            stored_in: Some(RunState::PendingFailure),
            error: None,
        };
        let mut last_transient: Option<Rejection> = None;

        loop {
            if self.cancel.is_cancelled() {
                return Ok(self.interrupted(report, last_transient));
            }

            let attempt_number = report.attempts + 1;
            tracing::debug!(
                fingerprint = %fingerprint.short(),
                attempt = attempt_number,
                max_attempts = self.policy.max_attempts(),
                "delivering run"
            );
            let outcome = self
                .transport
                .attempt(&self.target.host, &payload, &self.target.api_key);
            report.attempts = attempt_number;

            match outcome {
                Outcome::Delivered { status, remote_id } => {
                    tracing::info!(
                        fingerprint = %fingerprint.short(),
                        dataset = %payload.dataset_name,
                        status,
                        ?remote_id,
                        attempts = attempt_number,
                        "run delivered"
                    );
                    report.stored_in = self.settle_delivered(entry, options)?;
                    report.status = RunStatus::Delivered;
                    report.remote_id = remote_id;
                    return Ok(report);
                }
                Outcome::RejectedPermanent(rejection) => {
                    tracing::warn!(
                        fingerprint = %fingerprint.short(),
                        dataset = %payload.dataset_name,
                        reason = %rejection,
                        "run rejected permanently; kept for inspection"
                    );
                    entry.record_failure(stored_error(FailureKind::Permanent, &rejection));
                    self.store.put(&entry)?;
                    report.status = RunStatus::RejectedPermanently;
                    report.error = Some(DeliveryError::Permanent(rejection));
                    return Ok(report);
                }
                Outcome::RejectedTransient(ref rejection) => {
                    let retry = self.policy.should_retry(attempt_number, &outcome);
                    let kind = if retry {
                        FailureKind::Transient
                    } else {
                        FailureKind::ExhaustedRetries
                    };
                    entry.record_failure(stored_error(kind, rejection));
                    self.store.put(&entry)?;

                    if !retry {
                        tracing::warn!(
                            fingerprint = %fingerprint.short(),
                            dataset = %payload.dataset_name,
                            attempts = attempt_number,
                            reason = %rejection,
                            "giving up for now; run queued for retry"
                        );
                        report.error = Some(DeliveryError::ExhaustedRetries {
                            attempts: attempt_number,
                            last: rejection.clone(),
                        });
                        return Ok(report);
                    }

                    let delay = self.policy.delay_for(attempt_number, rejection);
                    tracing::warn!(
                        fingerprint = %fingerprint.short(),
                        attempt = attempt_number,
                        reason = %rejection,
                        delay_ms = delay.as_millis() as u64,
                        "transient delivery failure; backing off"
                    );
                    report.delays.push(delay);
                    last_transient = Some(rejection.clone());
                    if !self.cancel.sleep(delay) {
                        return Ok(self.interrupted(report, last_transient));
                    }
                }
            }
        }
    }

    /// Record `run` in `pending_failure` before the first attempt.
    fn write_ahead(&self, run: &Run) -> Result<StoredRun, StoreError> {
        let fingerprint = run.fingerprint();
        let existing = match self.store.get(&fingerprint, RunState::PendingFailure) {
            Ok(existing) => existing,
            Err(StoreError::Corrupt { path, reason }) => {
                tracing::warn!(path = %path.display(), %reason, "replacing unreadable entry");
                None
            }
            Err(e) => return Err(e),
        };

        let mut entry = match existing {
            Some(existing) => existing.with_run(run),
            None => StoredRun::new(run.clone(), RunState::PendingFailure),
        };
        if entry.run.uuid.is_none() {
            // Reuse the uuid of an earlier delivery so the service sees one
            // submission id per run content.
            let previous_uuid = match self.store.get(&fingerprint, RunState::Success) {
                Ok(Some(kept)) => kept.run.uuid,
                Ok(None) | Err(StoreError::Corrupt { .. }) => None,
                Err(e) => return Err(e),
            };
            let uuid = previous_uuid.unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
            entry.run = entry.run.with_uuid_if_missing(&uuid);
        }
        self.store.put(&entry)?;
        Ok(entry)
    }

    /// Move or discard the local copy after delivery.
    fn settle_delivered(
        &self,
        mut entry: StoredRun,
        options: UploadOptions,
    ) -> Result<Option<RunState>, StoreError> {
        let fingerprint = entry.fingerprint.clone();
        entry.record_delivery();

        if options.keeps_success_copy() {
            // The rename keeps the run in exactly one partition at every point.
            match self
                .store
                .move_entry(&fingerprint, RunState::PendingFailure, RunState::Success)
            {
                Ok(_) | Err(StoreError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
            entry.state = RunState::Success;
            self.store.put(&entry)?;
            Ok(Some(RunState::Success))
        } else {
            self.store.delete(&fingerprint, RunState::PendingFailure)?;
            self.store.delete(&fingerprint, RunState::Success)?;
            Ok(None)
        }
    }

    fn interrupted(&self, mut report: UploadReport, last: Option<Rejection>) -> UploadReport {
        tracing::info!(
            fingerprint = %report.fingerprint.short(),
            attempts = report.attempts,
            "upload cancelled; run stays queued"
        );
        report.status = RunStatus::Interrupted;
        report.error = last.map(DeliveryError::Transient);
        report
    }
}

fn stored_error(kind: FailureKind, rejection: &Rejection) -> StoredError {
    StoredError::new(kind, rejection.reason.clone(), rejection.status)
}
