//! CLI subcommand implementations for mteval-upload

pub mod list;
pub mod output;
pub mod replay;
pub mod signal;
pub mod upload;

use anyhow::{anyhow, Result};
use clap::{ArgAction, Args};
use mteval_upload::{default_data_dir, CancelToken, DeliveryTarget, RetryConfig, UploadConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// A run was not delivered, or a batch left runs behind.
pub const EXIT_UNDELIVERED: u8 = 1;
/// Storage failure or unusable input.
pub const EXIT_FATAL: u8 = 2;

/// Retry tuning shared by every command.
#[derive(Args, Debug, Clone)]
pub struct RetryArgs {
    /// Transport attempts per run before it is queued for later
    #[arg(long, global = true, default_value_t = 3)]
    pub max_attempts: u32,

    /// Wait after the first failed attempt, in milliseconds
    #[arg(long, global = true, default_value_t = 2_000)]
    pub retry_initial_ms: u64,

    /// Upper bound on any wait between attempts, in milliseconds
    #[arg(long, global = true, default_value_t = 10_000)]
    pub retry_max_ms: u64,
}

impl RetryArgs {
    pub fn to_config(&self) -> RetryConfig {
        RetryConfig::new(self.max_attempts, self.retry_initial_ms, self.retry_max_ms)
    }
}

/// Server address, credentials and keep flag.
///
/// `-h` is the host, so commands using these args carry a long-only `--help`.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Host URL for the vp-mteval server. For example: http://localhost:8000
    #[arg(short = 'h', long, env = "MTEVAL_HOST")]
    pub host: String,

    /// API key for the vp-mteval server
    #[arg(short = 'k', long, env = "MTEVAL_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Keep runs locally after a successful upload
    #[arg(short = 'K', long)]
    pub keep: bool,

    /// Print help
    #[allow(dead_code)]
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,
}

impl TargetArgs {
    pub fn target(&self) -> DeliveryTarget {
        DeliveryTarget::new(self.host.trim(), self.api_key.trim())
    }
}

/// Settings resolved from global flags, plus the interrupt token.
pub struct CliContext {
    pub data_dir: PathBuf,
    pub retry: RetryConfig,
    pub json: bool,
    pub cancel: CancelToken,
}

impl CliContext {
    pub fn new(data_dir: Option<PathBuf>, retry: RetryConfig, json: bool) -> Result<Self> {
        let data_dir = data_dir
            .or_else(default_data_dir)
            .ok_or_else(|| anyhow!("no data directory available; pass --data-dir"))?;
        Ok(Self {
            data_dir,
            retry,
            json,
            cancel: CancelToken::new(),
        })
    }

    /// Configuration for commands that talk to the server.
    pub fn upload_config(&self, target: &TargetArgs) -> UploadConfig {
        UploadConfig::new(target.target(), &self.data_dir).with_retry(self.retry)
    }
}

pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

pub fn report_fatal(err: &anyhow::Error) -> ExitCode {
    eprintln!("Error: {:#}", err);
    ExitCode::from(EXIT_FATAL)
}
