//! `upload`: deliver one run from a JSON file.

use anyhow::{Context, Result};
use clap::Parser;
use mteval_upload::{Run, UploadOptions};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use super::{output, signal, CliContext, TargetArgs, EXIT_UNDELIVERED};

#[derive(Parser, Debug)]
pub struct UploadCmd {
    /// Path to the data file to upload
    #[arg(short = 'd', long)]
    data: PathBuf,

    #[command(flatten)]
    target: TargetArgs,
}

impl UploadCmd {
    pub fn execute(&self, ctx: &CliContext) -> Result<ExitCode> {
        let run = read_run(&self.data)?;
        let orchestrator = ctx
            .upload_config(&self.target)
            .orchestrator(ctx.cancel.clone())
            .with_context(|| format!("failed to open data directory {}", ctx.data_dir.display()))?;
        signal::install(ctx.cancel.clone());

        let report = orchestrator
            .upload(&run, UploadOptions::keep(self.target.keep))
            .context("local storage failed; the run may not have been saved")?;
        output::print_upload_report(&report, &run.dataset_name, &ctx.data_dir, ctx.json)?;

        Ok(if report.is_delivered() {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(EXIT_UNDELIVERED)
        })
    }
}

fn read_run(path: &Path) -> Result<Run> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read data file {}", path.display()))?;
    let run: Run = serde_json::from_str(&text)
        .with_context(|| format!("{} does not contain a run", path.display()))?;
    run.validate()
        .with_context(|| format!("{} does not contain a valid run", path.display()))?;
    Ok(run)
}
