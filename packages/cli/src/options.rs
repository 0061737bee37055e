//! Resolves a [`MirrorConfig`] from an optional TOML file plus CLI flags.
//!
//! Flags override file values. Without `--config`, `--working-dir`,
//! `--region`, and `--bucket` are required.

use std::path::PathBuf;

use bucket_mirror::config::DEFAULT_FAILURE_LOG;
use bucket_mirror::models::{DiffMode, Granularity};
use bucket_mirror::{MirrorConfig, MirrorError};
use clap::Args;

/// Flags shared by every command that talks to the bucket.
#[derive(Debug, Default, Args)]
pub struct ConfigArgs {
    /// TOML config file
    #[arg(long, short)]
    pub config: Option<PathBuf>,
    /// Directory holding one subdirectory per partition
    #[arg(long)]
    pub working_dir: Option<PathBuf>,
    /// Folder inside each partition that holds the files (default: `data`)
    #[arg(long)]
    pub data_subdir: Option<String>,
    /// Object store region (e.g., "us-east-1")
    #[arg(long)]
    pub region: Option<String>,
    /// Destination bucket
    #[arg(long)]
    pub bucket: Option<String>,
    /// Custom S3-compatible endpoint URL
    #[arg(long)]
    pub endpoint_url: Option<String>,
    /// Maximum files per chunk
    #[arg(long)]
    pub chunk_size: Option<usize>,
    /// Maximum chunks uploading at once
    #[arg(long)]
    pub concurrency: Option<usize>,
    /// `all-partitions` or `new-partitions-only`
    #[arg(long)]
    pub mode: Option<DiffMode>,
    /// `file` or `partition`
    #[arg(long)]
    pub granularity: Option<Granularity>,
    /// Append-only failure record path
    #[arg(long)]
    pub failure_log: Option<PathBuf>,
}

impl ConfigArgs {
    /// Builds and validates the effective configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Config`] if the file cannot be loaded, a
    /// required value is missing, or validation fails.
    pub fn resolve(self) -> Result<MirrorConfig, MirrorError> {
        let mut config = match &self.config {
            Some(path) => MirrorConfig::load(path)?,
            None => MirrorConfig::new(
                self.working_dir
                    .clone()
                    .ok_or_else(|| missing("--working-dir"))?,
                self.region.clone().ok_or_else(|| missing("--region"))?,
                self.bucket.clone().ok_or_else(|| missing("--bucket"))?,
            ),
        };

        if let Some(working_dir) = self.working_dir {
            config.working_dir = working_dir;
        }
        if let Some(data_subdir) = self.data_subdir {
            config.data_subdir = data_subdir;
        }
        if let Some(region) = self.region {
            config.region = region;
        }
        if let Some(bucket) = self.bucket {
            config.bucket = bucket;
        }
        if let Some(endpoint_url) = self.endpoint_url {
            config.endpoint_url = Some(endpoint_url);
        }
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = chunk_size;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(mode) = self.mode {
            config.diff_mode = mode;
        }
        if let Some(granularity) = self.granularity {
            config.granularity = granularity;
        }
        if let Some(failure_log) = self.failure_log {
            config.failure_log = failure_log;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Flags of the `failures` command.
#[derive(Debug, Default, Args)]
pub struct FailuresArgs {
    /// TOML config file; its `failure_log` is read
    #[arg(long, short)]
    pub config: Option<PathBuf>,
    /// Failure record path (overrides the config file)
    #[arg(long)]
    pub path: Option<PathBuf>,
}

impl FailuresArgs {
    /// Picks `--path`, then the config's `failure_log`, then the default.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Config`] if `--config` cannot be loaded.
    pub fn resolve_path(self) -> Result<PathBuf, MirrorError> {
        if let Some(path) = self.path {
            return Ok(path);
        }
        match &self.config {
            Some(config) => Ok(MirrorConfig::load(config)?.failure_log),
            None => Ok(PathBuf::from(DEFAULT_FAILURE_LOG)),
        }
    }
}

fn missing(flag: &str) -> MirrorError {
    MirrorError::Config(format!("{flag} is required when --config is not given"))
}
