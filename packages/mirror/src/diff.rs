//! Difference engine.
//!
//! Works in two tiers. The partition-level difference is computed first
//! from the cheap top-level listings; file-level differences are then only
//! computed for partitions present on both sides. A partition missing
//! remotely needs no remote file listing at all: every local file in it is
//! pending.

use std::collections::BTreeSet;

use bucket_mirror_models::{DiffMode, Inventory, PendingWork};

/// Partition-level comparison of the two sides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionDiff {
    /// Present locally and remotely; need a file-level diff.
    pub shared: BTreeSet<String>,
    /// Present locally only.
    pub local_only: BTreeSet<String>,
    /// Present remotely only. Reported, never acted on.
    pub remote_only: BTreeSet<String>,
}

impl PartitionDiff {
    /// Partitions whose local file listing is needed under `mode`, in
    /// ascending order.
    #[must_use]
    pub fn local_scan_targets(&self, mode: DiffMode) -> BTreeSet<String> {
        let mut targets = self.shared.clone();
        if mode.schedules_new_partitions() {
            targets.extend(self.local_only.iter().cloned());
        }
        targets
    }

    /// Partitions whose remote file listing is needed. Always just the
    /// shared ones.
    #[must_use]
    pub const fn remote_scan_targets(&self) -> &BTreeSet<String> {
        &self.shared
    }
}

/// Compares the partition names found on each side.
#[must_use]
pub fn diff_partitions(local: &BTreeSet<String>, remote: &BTreeSet<String>) -> PartitionDiff {
    PartitionDiff {
        shared: local.intersection(remote).cloned().collect(),
        local_only: local.difference(remote).cloned().collect(),
        remote_only: remote.difference(local).cloned().collect(),
    }
}

/// Files in `local` that are absent from `remote`, ascending.
#[must_use]
pub fn diff_files(local: &BTreeSet<String>, remote: &BTreeSet<String>) -> Vec<String> {
    local.difference(remote).cloned().collect()
}

/// Computes the pending upload set.
///
/// `local` must hold file sets for every partition in
/// [`PartitionDiff::local_scan_targets`] and `remote` for every partition in
/// [`PartitionDiff::remote_scan_targets`]. A partition missing from either
/// inventory is treated as empty on that side.
#[must_use]
pub fn pending_work(
    partitions: &PartitionDiff,
    mode: DiffMode,
    local: &Inventory,
    remote: &Inventory,
) -> PendingWork {
    let empty = BTreeSet::new();
    let mut pending = PendingWork::new();

    for partition in &partitions.shared {
        let local_files = local.files(partition).unwrap_or(&empty);
        let remote_files = remote.files(partition).unwrap_or(&empty);
        let missing = diff_files(local_files, remote_files);
        if !missing.is_empty() {
            log::debug!("{partition}: {} file(s) missing remotely", missing.len());
        }
        pending.insert(partition.clone(), missing);
    }

    if mode.schedules_new_partitions() {
        for partition in &partitions.local_only {
            let files: Vec<String> = local
                .files(partition)
                .map(|f| f.iter().cloned().collect())
                .unwrap_or_default();
            log::debug!("{partition}: new partition, {} file(s)", files.len());
            pending.insert(partition.clone(), files);
        }
    }

    pending
}
