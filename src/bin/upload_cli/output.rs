//! Output formatting for mteval-upload
//!
//! Every command prints either human-readable lines or one JSON document.

use anyhow::Result;
use chrono::{DateTime, Utc};
use mteval_upload::{
    BatchSummary, Fingerprint, Listing, RunResult, RunResultStatus, RunState, RunStatus,
    StoredError, StoredRun, UploadReport,
};
use serde::Serialize;
use serde_json::json;
use std::path::Path;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn status_marker(status: RunResultStatus) -> &'static str {
    match status {
        RunResultStatus::Delivered => "\x1b[32m✓\x1b[0m",
        RunResultStatus::QueuedForRetry | RunResultStatus::Interrupted => "\x1b[33m✗\x1b[0m",
        RunResultStatus::RejectedPermanently => "\x1b[31m✗\x1b[0m",
        RunResultStatus::SkippedRejected => "\x1b[90m-\x1b[0m",
    }
}

/// What happened to the local copy, in words.
fn disposition(status: RunResultStatus) -> &'static str {
    match status {
        RunResultStatus::Delivered => "",
        RunResultStatus::QueuedForRetry => "failed, saved locally",
        RunResultStatus::RejectedPermanently => "saved locally with reason",
        RunResultStatus::Interrupted => "interrupted, saved locally",
        RunResultStatus::SkippedRejected => "left for inspection",
    }
}

fn format_result_line(result: &RunResult) -> String {
    let mut line = format!(
        "{} {} {} ({})",
        status_marker(result.status),
        result.status,
        result.dataset_name,
        result.fingerprint.short()
    );
    if let Some(id) = result.remote_id {
        line.push_str(&format!(" remote id {}", id));
    }
    let note = disposition(result.status);
    if !note.is_empty() {
        line.push_str(&format!(": {}", note));
    }
    if let Some(error) = &result.error {
        line.push_str(&format!("\n    {}", error));
    }
    line
}

pub fn print_upload_report(
    report: &UploadReport,
    dataset_name: &str,
    data_dir: &Path,
    json_output: bool,
) -> Result<()> {
    let error = report.error.as_ref().map(|e| e.to_string());
    if json_output {
        return print_json(&json!({
            "fingerprint": report.fingerprint,
            "dataset_name": dataset_name,
            "status": report.status,
            "attempts": report.attempts,
            "remote_id": report.remote_id,
            "stored_in": report.stored_in,
            "error": error,
        }));
    }

    let line = RunResult {
        fingerprint: report.fingerprint.clone(),
        dataset_name: dataset_name.to_string(),
        status: report.status.into(),
        attempts: report.attempts,
        remote_id: report.remote_id,
        error,
    };
    println!("{}", format_result_line(&line));
    match (report.status, report.stored_in) {
        (RunStatus::Delivered, Some(state)) => {
            println!("  kept in {}", data_dir.join(state.dir_name()).display());
        }
        (RunStatus::Delivered, None) => {}
        (RunStatus::RejectedPermanently, Some(state)) => {
            println!(
                "  fix the run in {} and resubmit with `mteval-upload upload-failed --include-rejected`",
                data_dir.join(state.dir_name()).display()
            );
        }
        _ => println!("  resubmit later with `mteval-upload upload-failed`"),
    }
    Ok(())
}

pub fn print_batch_summary(summary: &BatchSummary, json_output: bool) -> Result<()> {
    if json_output {
        return print_json(summary);
    }

    for result in &summary.results {
        println!("{}", format_result_line(result));
    }
    if summary.total == 0 && summary.unreadable == 0 {
        println!("No {} runs stored.", summary.selection);
        return Ok(());
    }

    println!();
    println!("\x1b[1mUpload {} summary\x1b[0m", summary.selection);
    println!("  Runs:                 {}", summary.total);
    println!("  Delivered:            {}", summary.delivered);
    if summary.newly_successful > 0 {
        println!("  Newly successful:     {}", summary.newly_successful);
    }
    println!("  Still failed:         {}", summary.still_failed());
    if summary.rejected_permanently + summary.skipped_rejected > 0 {
        println!(
            "  Rejected permanently: {} ({} skipped)",
            summary.rejected_permanently + summary.skipped_rejected,
            summary.skipped_rejected
        );
    }
    if summary.interrupted > 0 {
        println!("  Interrupted:          {}", summary.interrupted);
    }
    if summary.unreadable > 0 {
        println!("  Unreadable files:     {}", summary.unreadable);
    }
    Ok(())
}

#[derive(Serialize)]
struct ListedRun<'a> {
    state: RunState,
    fingerprint: &'a Fingerprint,
    namespace_name: &'a str,
    dataset_name: &'a str,
    attempt_count: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_error: Option<&'a StoredError>,
}

impl<'a> From<&'a StoredRun> for ListedRun<'a> {
    fn from(entry: &'a StoredRun) -> Self {
        Self {
            state: entry.state,
            fingerprint: &entry.fingerprint,
            namespace_name: &entry.run.namespace_name,
            dataset_name: &entry.run.dataset_name,
            attempt_count: entry.attempt_count,
            created_at: entry.created_at,
            updated_at: entry.updated_at,
            last_error: entry.last_error.as_ref(),
        }
    }
}

pub fn print_listing(sections: &[(RunState, Listing)], json_output: bool) -> Result<()> {
    if json_output {
        let runs: Vec<ListedRun<'_>> = sections
            .iter()
            .flat_map(|(_, listing)| listing.entries.iter().map(ListedRun::from))
            .collect();
        let unreadable: Vec<String> = sections
            .iter()
            .flat_map(|(_, listing)| listing.unreadable.iter())
            .map(|bad| bad.path.display().to_string())
            .collect();
        return print_json(&json!({ "runs": runs, "unreadable": unreadable }));
    }

    for (state, listing) in sections {
        println!("\x1b[1m{}\x1b[0m ({})", state, listing.len());
        for entry in &listing.entries {
            let mut line = format!(
                "  {}  {}/{}  attempts {}  {}",
                entry.fingerprint.short(),
                entry.run.namespace_name,
                entry.run.dataset_name,
                entry.attempt_count,
                entry.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            if let Some(error) = &entry.last_error {
                line.push_str(&format!("\n      last error ({}): {}", error.kind, error.message));
            }
            println!("{}", line);
        }
        for bad in &listing.unreadable {
            println!("  \x1b[31munreadable\x1b[0m {}: {}", bad.path.display(), bad.reason);
        }
    }
    Ok(())
}
