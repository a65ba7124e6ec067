//! mteval-upload: deliver MT-evaluation runs to a vp-mteval server
//!
//! Runs that cannot be delivered are kept in a local data directory and can
//! be resubmitted later.
//!
//! ## Example Usage
//!
//! ```bash
//! # Upload one run, keeping a local copy after delivery
//! mteval-upload upload -d run.json -h http://localhost:8000 -k $API_KEY -K
//!
//! # Retry everything that failed earlier
//! mteval-upload upload-failed -h http://localhost:8000 -k $API_KEY
//!
//! # Inspect what is stored locally
//! mteval-upload list --failed
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod upload_cli;

use mteval_upload::Selection;
use upload_cli::{list::ListCmd, replay::ReplayCmd, upload::UploadCmd, CliContext, RetryArgs};

#[derive(Parser)]
#[command(
    name = "mteval-upload",
    author,
    version,
    about = "Upload MT-evaluation runs to a vp-mteval server",
    long_about = "Uploads translation runs with retries and keeps undelivered runs locally\n\
                  so they can be resubmitted with `upload-failed`."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Local data directory (default: $MTEVAL_DATA_DIR or the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(flatten)]
    retry: RetryArgs,

    /// Output as JSON instead of human-readable format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (debug logging)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a single run from a JSON file
    #[command(disable_help_flag = true)]
    Upload(UploadCmd),

    /// Resubmit runs that failed to upload
    #[command(disable_help_flag = true)]
    UploadFailed(ReplayCmd),

    /// Resubmit runs kept after a successful upload
    #[command(disable_help_flag = true)]
    UploadSuccessful(ReplayCmd),

    /// Show runs stored locally
    List(ListCmd),
}

fn main() -> ExitCode {
    let Cli {
        command,
        data_dir,
        retry,
        json,
        verbose,
    } = Cli::parse();
    upload_cli::init_tracing(verbose);

    let ctx = match CliContext::new(data_dir, retry.to_config(), json) {
        Ok(ctx) => ctx,
        Err(err) => return upload_cli::report_fatal(&err),
    };

    let result = match command {
        Commands::Upload(cmd) => cmd.execute(&ctx),
        Commands::UploadFailed(cmd) => cmd.execute(&ctx, Selection::Failed),
        Commands::UploadSuccessful(cmd) => cmd.execute(&ctx, Selection::Succeeded),
        Commands::List(cmd) => cmd.execute(&ctx),
    };

    match result {
        Ok(code) => code,
        Err(err) => upload_cli::report_fatal(&err),
    }
}
