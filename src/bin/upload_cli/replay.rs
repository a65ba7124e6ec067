//! `upload-failed` / `upload-successful`: resubmit a stored partition.

use anyhow::{Context, Result};
use clap::Parser;
use mteval_upload::{BatchRunner, ReplayOptions, Selection, UploadOptions};
use std::process::ExitCode;

use super::{output, signal, CliContext, TargetArgs, EXIT_UNDELIVERED};

#[derive(Parser, Debug)]
pub struct ReplayCmd {
    #[command(flatten)]
    target: TargetArgs,

    /// Also resubmit runs the server rejected permanently (upload-failed)
    #[arg(long)]
    include_rejected: bool,
}

impl ReplayCmd {
    pub fn execute(&self, ctx: &CliContext, selection: Selection) -> Result<ExitCode> {
        let orchestrator = ctx
            .upload_config(&self.target)
            .orchestrator(ctx.cancel.clone())
            .with_context(|| format!("failed to open data directory {}", ctx.data_dir.display()))?;
        signal::install(ctx.cancel.clone());

        let options = ReplayOptions {
            upload: UploadOptions::keep(self.target.keep),
            include_rejected: self.include_rejected,
        };
        let summary = BatchRunner::new(&orchestrator)
            .replay(selection, options)
            .context("local storage failed during replay")?;
        output::print_batch_summary(&summary, ctx.json)?;

        Ok(if summary.still_failed() == 0 && summary.unreadable == 0 {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(EXIT_UNDELIVERED)
        })
    }
}
