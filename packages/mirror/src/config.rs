//! Run configuration.
//!
//! Loaded from TOML, optionally overridden by CLI flags, then validated once
//! via [`MirrorConfig::validate`] before a run is constructed.
//!
//! ```toml
//! working_dir = "/data/global-summary-of-the-day-archive"
//! region = "us-east-1"
//! bucket = "noaa-temperature-data"
//! chunk_size = 10
//! diff_mode = "new-partitions-only"
//! ```

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use bucket_mirror_models::{DiffMode, Granularity};
use serde::{Deserialize, Serialize};

use crate::MirrorError;

/// Default name of the per-partition folder holding the files.
pub const DEFAULT_DATA_SUBDIR: &str = "data";

/// Default failure record path, relative to the process working directory.
pub const DEFAULT_FAILURE_LOG: &str = "failed.txt";

const fn default_chunk_size() -> usize {
    10
}

const fn default_concurrency() -> usize {
    8
}

fn default_data_subdir() -> String {
    DEFAULT_DATA_SUBDIR.to_string()
}

fn default_failure_log() -> PathBuf {
    PathBuf::from(DEFAULT_FAILURE_LOG)
}

/// Everything a mirror run needs besides credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MirrorConfig {
    /// Directory holding one subdirectory per partition.
    pub working_dir: PathBuf,
    /// Folder inside each partition that holds the files.
    #[serde(default = "default_data_subdir")]
    pub data_subdir: String,
    /// Object store region.
    pub region: String,
    /// Destination bucket.
    pub bucket: String,
    /// Custom S3-compatible endpoint (e.g. `MinIO`, R2).
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// Maximum files per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Maximum chunks uploading at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Which partitions get scheduled.
    #[serde(default)]
    pub diff_mode: DiffMode,
    /// How pending files are grouped into chunks.
    #[serde(default)]
    pub granularity: Granularity,
    /// Append-only failure record.
    #[serde(default = "default_failure_log")]
    pub failure_log: PathBuf,
}

impl MirrorConfig {
    /// Creates a config with defaults for every optional field.
    #[must_use]
    pub fn new(
        working_dir: impl Into<PathBuf>,
        region: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            working_dir: working_dir.into(),
            data_subdir: default_data_subdir(),
            region: region.into(),
            bucket: bucket.into(),
            endpoint_url: None,
            chunk_size: default_chunk_size(),
            concurrency: default_concurrency(),
            diff_mode: DiffMode::default(),
            granularity: Granularity::default(),
            failure_log: default_failure_log(),
        }
    }

    /// Parses a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Config`] if the TOML is malformed or missing
    /// required fields.
    pub fn from_toml_str(text: &str) -> Result<Self, MirrorError> {
        toml::de::from_str(text).map_err(|e| MirrorError::Config(e.to_string()))
    }

    /// Reads and parses a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Config`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, MirrorError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| MirrorError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Checks invariants that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Config`] describing the first violation.
    pub fn validate(&self) -> Result<(), MirrorError> {
        let fail = |msg: &str| -> Result<(), MirrorError> {
            Err(MirrorError::Config(msg.to_string()))
        };

        if self.working_dir.as_os_str().is_empty() {
            return fail("working_dir must not be empty");
        }
        if self.region.trim().is_empty() {
            return fail("region must not be empty");
        }
        if self.bucket.trim().is_empty() {
            return fail("bucket must not be empty");
        }
        if self.data_subdir.is_empty() || self.data_subdir.contains(['/', '\\']) {
            return fail("data_subdir must be a single folder name");
        }
        if self.chunk_size == 0 {
            return fail("chunk_size must be at least 1");
        }
        if self.concurrency == 0 {
            return fail("concurrency must be at least 1");
        }
        if self.failure_log.as_os_str().is_empty() {
            return fail("failure_log must not be empty");
        }
        Ok(())
    }

    /// Chunk size as a non-zero value. Only meaningful after
    /// [`validate`](Self::validate); falls back to 1.
    #[must_use]
    pub fn chunk_size(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.chunk_size).unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_toml_with_defaults() {
        let config = MirrorConfig::from_toml_str(
            r#"
            working_dir = "/srv/gsod"
            region = "us-east-1"
            bucket = "noaa-temperature-data"
            "#,
        )
        .unwrap();

        assert_eq!(config.data_subdir, "data");
        assert_eq!(config.chunk_size, 10);
        assert_eq!(config.diff_mode, DiffMode::AllPartitions);
        assert_eq!(config.granularity, Granularity::File);
        assert_eq!(config.failure_log, PathBuf::from("failed.txt"));
        config.validate().unwrap();
    }

    #[test]
    fn parses_modes() {
        let config = MirrorConfig::from_toml_str(
            r#"
            working_dir = "/srv/gsod"
            region = "us-east-1"
            bucket = "b"
            diff_mode = "new-partitions-only"
            granularity = "partition"
            chunk_size = 200
            "#,
        )
        .unwrap();

        assert_eq!(config.diff_mode, DiffMode::NewPartitionsOnly);
        assert_eq!(config.granularity, Granularity::Partition);
        assert_eq!(config.chunk_size().get(), 200);
    }

    #[test]
    fn rejects_missing_bucket_and_unknown_keys() {
        assert!(MirrorConfig::from_toml_str("working_dir = \"/x\"\nregion = \"r\"").is_err());
        assert!(
            MirrorConfig::from_toml_str(
                "working_dir = \"/x\"\nregion = \"r\"\nbucket = \"b\"\nchunks = 3"
            )
            .is_err()
        );
    }

    #[test]
    fn example_config_is_valid() {
        let config =
            MirrorConfig::from_toml_str(include_str!("../../../mirror.example.toml")).unwrap();
        config.validate().unwrap();
        assert_eq!(config.bucket, "noaa-temperature-data");
    }

    #[test]
    fn validate_rejects_zero_chunk_size() {
        let mut config = MirrorConfig::new("/srv/gsod", "us-east-1", "b");
        config.chunk_size = 0;
        assert!(matches!(config.validate(), Err(MirrorError::Config(_))));
    }

    #[test]
    fn validate_rejects_nested_data_subdir() {
        let mut config = MirrorConfig::new("/srv/gsod", "us-east-1", "b");
        config.data_subdir = "data/csv".to_string();
        assert!(config.validate().is_err());
    }
}
