//! Scratch-directory helpers shared by the unit tests.

use std::path::{Path, PathBuf};

/// Returns a fresh, empty directory under the system temp dir.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "bucket_mirror_{name}_{}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Creates `{root}/{partition}/data/{file}` for each file, with the file
/// name as its contents.
pub fn write_local(root: &Path, partition: &str, files: &[&str]) {
    let dir = root.join(partition).join("data");
    std::fs::create_dir_all(&dir).unwrap();
    for file in files {
        std::fs::write(dir.join(file), file.as_bytes()).unwrap();
    }
}
