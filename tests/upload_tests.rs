//! Single-run delivery properties against a filesystem store.

mod common;

use common::*;
use mteval_upload::{
    CancelToken, FailureKind, FsRunStore, MemoryRunStore, RunState, RunStatus, RunStore,
    StoreError, UploadOptions, UploadOrchestrator,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn orchestrator(
    store: Arc<dyn RunStore>,
    transport: &Arc<ScriptedTransport>,
    max_attempts: u32,
) -> UploadOrchestrator {
    UploadOrchestrator::new(store, transport.clone(), target(), fast_policy(max_attempts))
}

fn fs_store(dir: &TempDir) -> Arc<FsRunStore> {
    Arc::new(FsRunStore::open(dir.path()).unwrap())
}

#[test]
fn test_same_content_never_duplicates_an_entry() {
    let dir = TempDir::new().unwrap();
    let store = fs_store(&dir);
    let transport = ScriptedTransport::new(unavailable()).shared();
    let orch = orchestrator(store.clone(), &transport, 2);

    let first = orch.upload(&greeting_run(), UploadOptions::keep(false)).unwrap();
    // Equivalent content rebuilt from JSON with a different field order.
    let reordered: mteval_upload::Run = serde_json::from_str(
        r#"{"segments":[{"tgt":"Bonjour","src":"Hello"}],"dataset_target_lang":"fr",
            "dataset_source_lang":"en","dataset_name":"greetings","namespace_name":"default"}"#,
    )
    .unwrap();
    let second = orch.upload(&reordered, UploadOptions::keep(false)).unwrap();

    assert_eq!(first.fingerprint, second.fingerprint);
    let pending = store.list(RunState::PendingFailure).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending.entries[0].attempt_count, 4);
}

#[test]
fn test_run_survives_process_death_after_transient_failure() {
    let dir = TempDir::new().unwrap();
    let cancel = CancelToken::new();
    let fingerprint = {
        let store = fs_store(&dir);
        let killer = cancel.clone();
        // Stop right after the first transient outcome, before anything else happens.
        let transport = ScriptedTransport::new(unavailable())
            .on_attempt(move |_| killer.cancel())
            .shared();
        let report = orchestrator(store, &transport, 3)
            .with_cancel(cancel)
            .upload(&greeting_run(), UploadOptions::keep(true))
            .unwrap();
        assert_eq!(report.status, RunStatus::Interrupted);
        assert_eq!(transport.call_count(), 1);
        report.fingerprint
    };

    let reopened = FsRunStore::open(dir.path()).unwrap();
    let pending = reopened.list(RunState::PendingFailure).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending.entries[0].fingerprint, fingerprint);
    assert_eq!(pending.entries[0].attempt_count, 1);
    assert!(reopened.list(RunState::Success).unwrap().is_empty());
}

#[test]
fn test_attempts_are_bounded_and_delays_never_decrease() {
    let dir = TempDir::new().unwrap();
    let transport = ScriptedTransport::new(unavailable()).shared();
    let report = orchestrator(fs_store(&dir), &transport, 5)
        .upload(&greeting_run(), UploadOptions::keep(false))
        .unwrap();

    assert_eq!(report.status, RunStatus::QueuedForRetry);
    assert_eq!(transport.call_count(), 5);
    assert_eq!(report.attempts, 5);
    assert_eq!(report.delays.len(), 4);
    for pair in report.delays.windows(2) {
        assert!(pair[0] <= pair[1], "delays decreased: {:?}", report.delays);
    }
    assert!(report.delays.iter().all(|d| *d <= Duration::from_millis(8)));
}

#[test]
fn test_rate_limit_hint_is_honored_up_to_the_cap() {
    let dir = TempDir::new().unwrap();
    let transport = ScriptedTransport::new(delivered())
        .with_sequence(vec![rate_limited(Duration::from_millis(6)), rate_limited(Duration::from_secs(60))])
        .shared();
    let report = orchestrator(fs_store(&dir), &transport, 3)
        .upload(&greeting_run(), UploadOptions::keep(false))
        .unwrap();

    assert!(report.is_delivered());
    assert_eq!(report.delays.len(), 2);
    assert!(report.delays[0] >= Duration::from_millis(6));
    assert_eq!(report.delays[1], Duration::from_millis(8));
}

#[test]
fn test_delivery_without_keep_leaves_no_entry() {
    let dir = TempDir::new().unwrap();
    let store = fs_store(&dir);
    let transport = ScriptedTransport::new(delivered()).shared();
    let report = orchestrator(store.clone(), &transport, 3)
        .upload(&greeting_run(), UploadOptions::keep(false))
        .unwrap();

    assert!(report.is_delivered());
    assert_eq!(report.stored_in, None);
    for state in RunState::ALL {
        assert!(!store.contains(&report.fingerprint, state).unwrap());
    }
}

#[test]
fn test_delivery_with_keep_leaves_one_success_entry() {
    let dir = TempDir::new().unwrap();
    let store = fs_store(&dir);
    let transport = ScriptedTransport::new(delivered()).shared();
    let report = orchestrator(store.clone(), &transport, 3)
        .upload(&greeting_run(), UploadOptions::keep(true))
        .unwrap();

    assert_eq!(report.stored_in, Some(RunState::Success));
    assert!(store.list(RunState::PendingFailure).unwrap().is_empty());
    let kept = store.list(RunState::Success).unwrap();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept.entries[0].state, RunState::Success);
}

#[test]
fn test_unavailable_then_accepted() {
    let dir = TempDir::new().unwrap();
    let store = fs_store(&dir);
    let transport = ScriptedTransport::new(delivered())
        .with_sequence(vec![unavailable()])
        .shared();
    let run = greeting_run();
    let report = orchestrator(store.clone(), &transport, 3)
        .upload(&run, UploadOptions::keep(true))
        .unwrap();

    assert!(report.is_delivered());
    assert_eq!(transport.call_count(), 2);
    assert_eq!(report.delays.len(), 1);
    assert!(!store
        .contains(&run.fingerprint(), RunState::PendingFailure)
        .unwrap());
    let kept = store
        .get(&run.fingerprint(), RunState::Success)
        .unwrap()
        .expect("success copy");
    assert_eq!(kept.run.segments, run.segments);
    assert_eq!(kept.attempt_count, 2);
}

#[test]
fn test_permanent_rejection_is_kept_with_reason() {
    let dir = TempDir::new().unwrap();
    let store = fs_store(&dir);
    let transport = ScriptedTransport::new(rejected(401)).shared();
    let report = orchestrator(store.clone(), &transport, 3)
        .upload(&greeting_run(), UploadOptions::keep(false))
        .unwrap();

    assert_eq!(report.status, RunStatus::RejectedPermanently);
    assert_eq!(transport.call_count(), 1);
    let entry = store
        .get(&report.fingerprint, RunState::PendingFailure)
        .unwrap()
        .expect("kept for inspection");
    let error = entry.last_error.expect("reason recorded");
    assert_eq!(error.kind, FailureKind::Permanent);
    assert_eq!(error.status, Some(401));
}

#[test]
fn test_submission_uuid_survives_restart() {
    let dir = TempDir::new().unwrap();
    let first = ScriptedTransport::new(unavailable()).shared();
    orchestrator(fs_store(&dir), &first, 1)
        .upload(&greeting_run(), UploadOptions::keep(false))
        .unwrap();

    let second = ScriptedTransport::new(delivered()).shared();
    orchestrator(fs_store(&dir), &second, 1)
        .upload(&greeting_run(), UploadOptions::keep(false))
        .unwrap();

    let sent_first = first.calls()[0].uuid.clone().expect("uuid assigned");
    let sent_second = second.calls()[0].uuid.clone().expect("uuid reused");
    assert_eq!(sent_first, sent_second);
}

#[test]
fn test_storage_failure_aborts_before_sending() {
    let store = Arc::new(MemoryRunStore::new());
    store.set_read_only(true);
    let transport = ScriptedTransport::new(delivered()).shared();
    let result = orchestrator(store, &transport, 3).upload(&greeting_run(), UploadOptions::keep(true));

    assert!(matches!(result, Err(StoreError::Io { .. })));
    assert_eq!(transport.call_count(), 0);
}
