//! Upload dispatcher: executes one chunk.
//!
//! Files in a chunk upload sequentially; each file's outcome is independent.
//! A failed put is logged, appended to the [`FailureRecord`], and counted,
//! and the chunk moves on to its next file.

use std::path::PathBuf;
use std::sync::Arc;

use bucket_mirror_models::{Chunk, TransferOutcome};

use crate::failure_record::FailureRecord;
use crate::progress::ProgressCallback;
use crate::store::{RemoteStore, object_key};

/// Uploads chunks from the local working directory to a [`RemoteStore`].
///
/// Cheap to share: every chunk in flight borrows the same dispatcher.
pub struct UploadDispatcher {
    store: Arc<dyn RemoteStore>,
    working_dir: PathBuf,
    data_subdir: String,
    failures: Arc<FailureRecord>,
    progress: Arc<dyn ProgressCallback>,
}

impl UploadDispatcher {
    /// Creates a dispatcher.
    #[must_use]
    pub fn new(
        store: Arc<dyn RemoteStore>,
        working_dir: impl Into<PathBuf>,
        data_subdir: impl Into<String>,
        failures: Arc<FailureRecord>,
        progress: Arc<dyn ProgressCallback>,
    ) -> Self {
        Self {
            store,
            working_dir: working_dir.into(),
            data_subdir: data_subdir.into(),
            failures,
            progress,
        }
    }

    /// Local path of a pending file.
    #[must_use]
    pub fn local_path(&self, partition: &str, file_name: &str) -> PathBuf {
        self.working_dir
            .join(partition)
            .join(&self.data_subdir)
            .join(file_name)
    }

    /// Uploads every file in `chunk`, never aborting on a single failure.
    pub async fn dispatch(&self, chunk: &Chunk) -> TransferOutcome {
        let mut outcome = TransferOutcome::default();

        for file_name in &chunk.files {
            let key = object_key(&chunk.partition, file_name);
            let local = self.local_path(&chunk.partition, file_name);

            match self.store.put_file(&key, &local).await {
                Ok(()) => {
                    log::debug!("uploaded {key}");
                    outcome.succeeded += 1;
                }
                Err(e) => {
                    log::warn!("{} | {file_name}: {e}", chunk.partition);
                    if let Err(io) = self.failures.append(&chunk.partition, file_name).await {
                        log::error!(
                            "Failed to record failure of {key} in {}: {io}",
                            self.failures.path().display()
                        );
                    }
                    outcome.failed += 1;
                }
            }

            self.progress.inc(1);
        }

        log::info!(
            "{} | chunk of {}: {outcome}",
            chunk.partition,
            chunk.files.len()
        );
        outcome
    }
}
