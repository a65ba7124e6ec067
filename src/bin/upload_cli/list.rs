//! `list`: show stored runs without touching the network.

use anyhow::{Context, Result};
use clap::Parser;
use mteval_upload::{FsRunStore, RunState, RunStore};
use std::process::ExitCode;

use super::{output, CliContext};

#[derive(Parser, Debug)]
pub struct ListCmd {
    /// Only runs waiting to be uploaded
    #[arg(long, conflicts_with = "successful")]
    failed: bool,

    /// Only runs kept after a successful upload
    #[arg(long)]
    successful: bool,
}

impl ListCmd {
    fn states(&self) -> Vec<RunState> {
        match (self.failed, self.successful) {
            (true, _) => vec![RunState::PendingFailure],
            (_, true) => vec![RunState::Success],
            _ => RunState::ALL.to_vec(),
        }
    }

    pub fn execute(&self, ctx: &CliContext) -> Result<ExitCode> {
        let store = FsRunStore::open(&ctx.data_dir)
            .with_context(|| format!("failed to open data directory {}", ctx.data_dir.display()))?;

        let mut sections = Vec::new();
        for state in self.states() {
            let mut listing = store
                .list(state)
                .with_context(|| format!("failed to list {} runs", state))?;
            listing.entries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            sections.push((state, listing));
        }
        output::print_listing(&sections, ctx.json)?;
        Ok(ExitCode::SUCCESS)
    }
}
