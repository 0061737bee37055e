#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for mirroring a partitioned local archive into a bucket.
//!
//! Uses `indicatif-log-bridge` (via [`bucket_mirror_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and the upload progress bar never fight for the terminal.
//!
//! Credentials come from `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY`
//! (and optionally `AWS_SESSION_TOKEN`).

mod options;
mod report;

use std::sync::Arc;

use bucket_mirror::Mirror;
use bucket_mirror_cli_utils::IndicatifProgress;
use bucket_mirror_s3::{S3Store, StoreCredentials};
use clap::{Parser, Subcommand};
use dialoguer::Confirm;

use crate::options::{ConfigArgs, FailuresArgs};

#[derive(Parser)]
#[command(name = "bucket_mirror", about = "Upload the files a bucket mirror is missing")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan both sides, upload every missing file, and record failures
    Run {
        #[command(flatten)]
        config: ConfigArgs,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Scan both sides and show what would be uploaded, without uploading
    Plan {
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Summarize the failure record
    Failures {
        #[command(flatten)]
        args: FailuresArgs,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = bucket_mirror_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, yes } => {
            let mirror = connect(config)?;
            let plan = mirror.plan().await?;
            report::print_plan(&plan);

            if plan.pending.is_empty() {
                return Ok(());
            }

            if !yes {
                let proceed = Confirm::new()
                    .with_prompt(format!(
                        "Upload {} file(s) in {} chunk(s)?",
                        plan.pending.total_files(),
                        plan.chunks.len()
                    ))
                    .default(true)
                    .interact()?;
                if !proceed {
                    println!("Aborted.");
                    return Ok(());
                }
            }

            let progress = IndicatifProgress::files_bar(&multi, "Uploading");
            let report = mirror.with_progress(progress).execute(plan).await;
            println!("{report}");
            if report.outcome.failed > 0 {
                println!("Re-run to retry the files that are still missing.");
            }
        }
        Commands::Plan { config } => {
            let mirror = connect(config)?;
            let plan = mirror.plan().await?;
            report::print_plan(&plan);
        }
        Commands::Failures { args } => {
            let path = args.resolve_path()?;
            log::info!("Reading {}", path.display());
            let log = bucket_mirror::failure_record::read_entries(&path).await?;
            report::print_failures(&log);
        }
    }

    Ok(())
}

/// Resolves the config and credentials and binds them to an S3 store.
fn connect(args: ConfigArgs) -> Result<Mirror, Box<dyn std::error::Error>> {
    let config = args.resolve()?;
    let credentials = StoreCredentials::from_env().inspect_err(|e| {
        log::error!("Store not configured: {e}");
        log::error!("Required env vars: AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY");
    })?;
    let store = Arc::new(S3Store::from_config(&config, credentials));
    Ok(Mirror::new(config, store)?)
}
