//! Append-only failure record.
//!
//! One line per failed upload:
//!
//! ```text
//! 2019 | 01001099999.csv | 2021-05-07 14:03:11.482913
//! ```
//!
//! The file is never truncated or rotated. Each append opens the file in
//! append mode and writes one complete line in a single `write_all`, while
//! holding a lock that covers only that line. Concurrent chunks therefore
//! never interleave partial lines.
//!
//! The record is advisory: runs re-derive pending work from the live
//! inventories and never read it back. [`read_entries`] exists for operator
//! inspection.

use std::path::{Path, PathBuf};

use bucket_mirror_models::FailureEntry;
use chrono::{DateTime, Local};
use tokio::io::AsyncWriteExt as _;
use tokio::sync::Mutex;

/// Field separator between partition, file name, and timestamp.
pub const SEPARATOR: &str = " | ";

/// Timestamp format, local time with microseconds.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Handle to the failure record file, shared by all chunks of a run.
#[derive(Debug)]
pub struct FailureRecord {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FailureRecord {
    /// Creates a handle. The file is created lazily on the first append.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the record file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends a line for a failed upload, stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the record cannot be opened or written.
    pub async fn append(&self, partition: &str, file_name: &str) -> std::io::Result<()> {
        self.append_at(partition, file_name, Local::now()).await
    }

    /// Appends a line with an explicit timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`std::io::ErrorKind::InvalidInput`] if a field contains a line
    /// break or the separator, since such a line could not be read back.
    /// Returns other I/O errors if the record cannot be opened or written.
    pub async fn append_at(
        &self,
        partition: &str,
        file_name: &str,
        at: DateTime<Local>,
    ) -> std::io::Result<()> {
        check_field("partition", partition)?;
        check_field("file name", file_name)?;
        let line = format_line(partition, file_name, at);

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}

fn check_field(what: &str, value: &str) -> std::io::Result<()> {
    if value.contains(['\n', '\r']) || value.contains(SEPARATOR) {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{what} {value:?} cannot be written to the failure record"),
        ));
    }
    Ok(())
}

/// Formats one record line, including the trailing newline.
#[must_use]
pub fn format_line(partition: &str, file_name: &str, at: DateTime<Local>) -> String {
    format!(
        "{partition}{SEPARATOR}{file_name}{SEPARATOR}{}\n",
        at.format(TIMESTAMP_FORMAT)
    )
}

/// Parses one record line. Returns `None` for blank or malformed lines.
#[must_use]
pub fn parse_line(line: &str) -> Option<FailureEntry> {
    let mut fields = line.trim_end_matches(['\r', '\n']).splitn(3, SEPARATOR);
    let partition = fields.next().filter(|s| !s.is_empty())?;
    let file_name = fields.next().filter(|s| !s.is_empty())?;
    let timestamp = fields.next()?;
    Some(FailureEntry {
        partition: partition.to_string(),
        file_name: file_name.to_string(),
        timestamp: timestamp.to_string(),
    })
}

/// Contents of a failure record file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FailureLog {
    /// Well-formed entries, in file order.
    pub entries: Vec<FailureEntry>,
    /// Number of non-blank lines that could not be parsed.
    pub malformed: usize,
}

/// Reads every entry of the record at `path`. A missing file reads as an
/// empty log.
///
/// # Errors
///
/// Returns an I/O error if the file exists but cannot be read.
pub async fn read_entries(path: &Path) -> std::io::Result<FailureLog> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(FailureLog::default()),
        Err(e) => return Err(e),
    };

    let mut log = FailureLog::default();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        match parse_line(line) {
            Some(entry) => log.entries.push(entry),
            None => log.malformed += 1,
        }
    }
    Ok(log)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeZone as _;

    use super::*;
    use crate::testing::scratch_dir;

    #[test]
    fn line_format_matches_record_layout() {
        let at = Local.with_ymd_and_hms(2021, 5, 7, 14, 3, 11).unwrap();
        assert_eq!(
            format_line("2019", "a.csv", at),
            "2019 | a.csv | 2021-05-07 14:03:11.000000\n"
        );
    }

    #[test]
    fn parses_written_lines_and_rejects_garbage() {
        let entry = parse_line("2019 | a.csv | 2021-05-07 14:03:11.000000").unwrap();
        assert_eq!(entry.partition, "2019");
        assert_eq!(entry.file_name, "a.csv");
        assert_eq!(entry.timestamp, "2021-05-07 14:03:11.000000");

        assert!(parse_line("2019 | a.csv").is_none());
        assert!(parse_line(" | a.csv | now").is_none());
    }

    #[tokio::test]
    async fn append_writes_exactly_one_line() {
        let dir = scratch_dir("failure_append");
        let record = FailureRecord::new(dir.join("failed.txt"));

        record.append("2019", "b.csv").await.unwrap();

        let log = read_entries(record.path()).await.unwrap();
        assert_eq!(log.entries.len(), 1);
        assert_eq!(log.entries[0].partition, "2019");
        assert_eq!(log.entries[0].file_name, "b.csv");
        assert_eq!(log.malformed, 0);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn appends_accumulate_across_handles() {
        let dir = scratch_dir("failure_accumulate");
        let path = dir.join("failed.txt");

        FailureRecord::new(&path).append("2019", "a.csv").await.unwrap();
        FailureRecord::new(&path).append("2020", "b.csv").await.unwrap();

        let log = read_entries(&path).await.unwrap();
        assert_eq!(log.entries.len(), 2);
        assert_eq!(log.entries[1].partition, "2020");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_do_not_interleave() {
        let dir = scratch_dir("failure_concurrent");
        let record = Arc::new(FailureRecord::new(dir.join("failed.txt")));

        let mut handles = Vec::new();
        for i in 0..50 {
            let record = Arc::clone(&record);
            handles.push(tokio::spawn(async move {
                record.append("2019", &format!("{i:04}.csv")).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let log = read_entries(record.path()).await.unwrap();
        assert_eq!(log.entries.len(), 50);
        assert_eq!(log.malformed, 0);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn unreadable_names_are_rejected_without_writing() {
        let dir = scratch_dir("failure_reject");
        let record = FailureRecord::new(dir.join("failed.txt"));

        let err = record.append("2019", "a | b.csv").await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
        let err = record.append("2019", "a\nb.csv").await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
        assert!(record.append("20\r19", "a.csv").await.is_err());

        record.append("2019", "a|b.csv").await.unwrap();

        let log = read_entries(record.path()).await.unwrap();
        assert_eq!(log.entries.len(), 1);
        assert_eq!(log.entries[0].file_name, "a|b.csv");
        assert_eq!(log.malformed, 0);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn missing_record_reads_empty() {
        let dir = scratch_dir("failure_missing");
        let log = read_entries(&dir.join("nope.txt")).await.unwrap();
        assert_eq!(log, FailureLog::default());
    }
}
