//! Local inventory reader.
//!
//! Layout: `{working_dir}/{partition}/{data_subdir}/{file}`. Only that one
//! fixed level is read; anything nested deeper is ignored.

use std::collections::BTreeSet;
use std::path::Path;

use crate::MirrorError;

/// Lists the partition directories directly under `working_dir`. Symlinks
/// to directories count as partitions.
///
/// # Errors
///
/// Returns [`MirrorError::Io`] if `working_dir` does not exist or cannot be
/// read.
pub fn list_partitions(working_dir: &Path) -> Result<BTreeSet<String>, MirrorError> {
    let io_err = |source| MirrorError::Io {
        path: working_dir.to_path_buf(),
        source,
    };

    let mut partitions = BTreeSet::new();
    for entry in std::fs::read_dir(working_dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        if !std::fs::metadata(entry.path()).is_ok_and(|meta| meta.is_dir()) {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => {
                partitions.insert(name);
            }
            Err(name) => log::warn!("Skipping non UTF-8 partition name {name:?}"),
        }
    }

    log::info!(
        "Found {} local partition(s) in {}",
        partitions.len(),
        working_dir.display()
    );
    Ok(partitions)
}

/// Lists the regular files in `{working_dir}/{partition}/{data_subdir}`.
///
/// Symlinks are followed, so a link to a regular file is listed under the
/// link's name. Entries that cannot be listed (non UTF-8 names, broken
/// links, directories) are logged and skipped.
///
/// Never fails: an unreadable or missing partition is logged and reported
/// as empty, so it shows up as a difference instead of aborting the scan.
#[must_use]
pub fn list_files(working_dir: &Path, partition: &str, data_subdir: &str) -> BTreeSet<String> {
    let dir = working_dir.join(partition).join(data_subdir);

    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("Cannot read {}: {e}; treating as empty", dir.display());
            return BTreeSet::new();
        }
    };

    let mut files = BTreeSet::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable entry in {}: {e}", dir.display());
                continue;
            }
        };
        let path = entry.path();

        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() => {}
            Ok(meta) if meta.is_dir() => {
                log::debug!("Ignoring nested directory {}", path.display());
                continue;
            }
            Ok(_) => {
                log::warn!("Skipping {}: not a regular file", path.display());
                continue;
            }
            Err(e) => {
                log::warn!("Skipping {}: {e}", path.display());
                continue;
            }
        }

        match entry.file_name().into_string() {
            Ok(name) => {
                files.insert(name);
            }
            Err(name) => log::warn!("Skipping non UTF-8 file name {name:?} in {}", dir.display()),
        }
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{scratch_dir, write_local};

    #[test]
    fn lists_partitions_and_files() {
        let root = scratch_dir("local_lists");
        write_local(&root, "2019", &["a.csv", "b.csv"]);
        write_local(&root, "2020", &["c.csv"]);
        std::fs::write(root.join("README"), b"not a partition").unwrap();
        std::fs::create_dir_all(root.join("2019/data/nested")).unwrap();

        let partitions = list_partitions(&root).unwrap();
        assert_eq!(partitions.into_iter().collect::<Vec<_>>(), ["2019", "2020"]);

        let files = list_files(&root, "2019", "data");
        assert_eq!(files.into_iter().collect::<Vec<_>>(), ["a.csv", "b.csv"]);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn missing_working_dir_is_io_error() {
        let root = scratch_dir("local_missing").join("does-not-exist");
        let err = list_partitions(&root).unwrap_err();
        assert!(matches!(err, MirrorError::Io { .. }));
    }

    #[test]
    fn partition_without_data_dir_is_empty() {
        let root = scratch_dir("local_no_data");
        std::fs::create_dir_all(root.join("2021")).unwrap();

        assert!(list_files(&root, "2021", "data").is_empty());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[cfg(unix)]
    #[test]
    fn follows_file_symlinks_and_skips_unlistable_entries() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt as _;
        use std::os::unix::fs::symlink;

        let root = scratch_dir("local_symlinks");
        write_local(&root, "2019", &["a.csv"]);
        let data = root.join("2019/data");

        let target = root.join("elsewhere.csv");
        std::fs::write(&target, b"linked").unwrap();
        symlink(&target, data.join("link.csv")).unwrap();
        symlink(root.join("missing.csv"), data.join("dangling.csv")).unwrap();
        symlink(&root, data.join("dir_link")).unwrap();
        // Some filesystems refuse non UTF-8 names; the rest of the test
        // still applies.
        let _ = std::fs::write(data.join(OsStr::from_bytes(b"b\xff.csv")), b"bytes");

        let files = list_files(&root, "2019", "data");

        assert_eq!(files.into_iter().collect::<Vec<_>>(), ["a.csv", "link.csv"]);

        let _ = std::fs::remove_dir_all(&root);
    }
}
