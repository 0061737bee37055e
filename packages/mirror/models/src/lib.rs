#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Inventory, pending work, chunk, and outcome types for bucket mirroring.
//!
//! A *partition* is a top-level grouping of files (a year folder locally, a
//! `{year}/` key prefix remotely). Everything here is rebuilt from live
//! state on every run; only the failure record and the bucket contents
//! outlive a run.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Which partitions the difference engine schedules for upload.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DiffMode {
    /// Only partitions present on both sides are diffed. Partitions missing
    /// remotely are reported but not uploaded.
    #[default]
    AllPartitions,
    /// Partitions present on both sides are diffed, and every file of a
    /// partition entirely missing remotely is scheduled as well.
    NewPartitionsOnly,
}

impl DiffMode {
    /// Whether partitions that exist only locally get scheduled.
    #[must_use]
    pub const fn schedules_new_partitions(self) -> bool {
        matches!(self, Self::NewPartitionsOnly)
    }
}

/// How pending files are grouped into units of concurrent work.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Granularity {
    /// Bounded slices of at most `chunk_size` files.
    #[default]
    File,
    /// One chunk per partition, regardless of size.
    Partition,
}

/// Partition name -> set of file names, for one side of the mirror.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    partitions: BTreeMap<String, BTreeSet<String>>,
}

impl Inventory {
    /// Creates an empty inventory.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            partitions: BTreeMap::new(),
        }
    }

    /// Records the file set for `partition`, replacing any previous entry.
    pub fn insert(&mut self, partition: impl Into<String>, files: BTreeSet<String>) {
        self.partitions.insert(partition.into(), files);
    }

    /// Files recorded for `partition`, if it was scanned.
    #[must_use]
    pub fn files(&self, partition: &str) -> Option<&BTreeSet<String>> {
        self.partitions.get(partition)
    }

    /// Scanned partition names in ascending order.
    pub fn partitions(&self) -> impl Iterator<Item = &str> {
        self.partitions.keys().map(String::as_str)
    }

    /// Number of scanned partitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    /// Whether no partition has been scanned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }
}

impl<P, F> FromIterator<(P, F)> for Inventory
where
    P: Into<String>,
    F: IntoIterator,
    F::Item: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (P, F)>>(iter: I) -> Self {
        Self {
            partitions: iter
                .into_iter()
                .map(|(p, files)| (p.into(), files.into_iter().map(Into::into).collect()))
                .collect(),
        }
    }
}

/// Files present locally but absent remotely, grouped by partition.
///
/// Partitions and files are kept in ascending name order. Partitions with no
/// pending files are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingWork {
    partitions: BTreeMap<String, Vec<String>>,
}

impl PendingWork {
    /// Creates an empty pending set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            partitions: BTreeMap::new(),
        }
    }

    /// Adds the pending files for `partition`. Empty lists are dropped.
    pub fn insert(&mut self, partition: impl Into<String>, files: Vec<String>) {
        if !files.is_empty() {
            self.partitions.insert(partition.into(), files);
        }
    }

    /// Pending files for `partition`.
    #[must_use]
    pub fn files(&self, partition: &str) -> Option<&[String]> {
        self.partitions.get(partition).map(Vec::as_slice)
    }

    /// Iterates `(partition, files)` in ascending partition order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.partitions
            .iter()
            .map(|(p, files)| (p.as_str(), files.as_slice()))
    }

    /// Number of partitions with at least one pending file.
    #[must_use]
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Total number of pending files across all partitions.
    #[must_use]
    pub fn total_files(&self) -> usize {
        self.partitions.values().map(Vec::len).sum()
    }

    /// Whether there is nothing to upload.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }
}

/// One unit of concurrent upload work: a contiguous slice of one
/// partition's pending files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Partition the files belong to.
    pub partition: String,
    /// File names, in pending order.
    pub files: Vec<String>,
}

impl Chunk {
    /// Number of files in the chunk.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the chunk carries no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Success and failure counts for one chunk (or a whole run, once merged).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOutcome {
    /// Files uploaded successfully.
    pub succeeded: u64,
    /// Files whose upload failed and were written to the failure record.
    pub failed: u64,
}

impl TransferOutcome {
    /// Merge another outcome into this one.
    pub const fn merge(&mut self, other: Self) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
    }

    /// Total number of files attempted.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.succeeded + self.failed
    }
}

impl std::fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} uploaded, {} failed", self.succeeded, self.failed)
    }
}

/// One parsed line of the failure record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEntry {
    /// Partition of the failed file.
    pub partition: String,
    /// File name within the partition.
    pub file_name: String,
    /// Timestamp text as written, local time.
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn diff_mode_parses_kebab_case() {
        assert_eq!(
            DiffMode::from_str("new-partitions-only").unwrap(),
            DiffMode::NewPartitionsOnly
        );
        assert_eq!(DiffMode::AllPartitions.to_string(), "all-partitions");
        assert!(DiffMode::from_str("everything").is_err());
    }

    #[test]
    fn pending_work_drops_empty_partitions() {
        let mut pending = PendingWork::new();
        pending.insert("2019", vec!["a.csv".to_string()]);
        pending.insert("2020", Vec::new());

        assert_eq!(pending.partition_count(), 1);
        assert_eq!(pending.total_files(), 1);
        assert!(pending.files("2020").is_none());
    }

    #[test]
    fn inventory_collects_from_pairs() {
        let inventory: Inventory = [("2020", vec!["b.csv", "a.csv"]), ("2019", vec![])]
            .into_iter()
            .collect();

        assert_eq!(inventory.partitions().collect::<Vec<_>>(), ["2019", "2020"]);
        assert_eq!(inventory.files("2020").unwrap().len(), 2);
        assert!(inventory.files("2019").unwrap().is_empty());
    }

    #[test]
    fn outcomes_merge() {
        let mut total = TransferOutcome::default();
        total.merge(TransferOutcome {
            succeeded: 3,
            failed: 1,
        });
        total.merge(TransferOutcome {
            succeeded: 2,
            failed: 0,
        });
        assert_eq!(total.total(), 6);
        assert_eq!(total.to_string(), "5 uploaded, 1 failed");
    }
}
