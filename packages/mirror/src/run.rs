//! Orchestrator: wires inventory readers, the difference engine, the chunk
//! planner, and the upload dispatcher into one run.
//!
//! A run moves through [`RunStage`]s in order and never goes back. Scanning
//! and diffing failures abort the run; upload failures are recorded and the
//! run carries on. Re-running from scratch is always safe: the bucket is the
//! only record of what has been uploaded, so a new run simply recomputes what
//! is still missing.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bucket_mirror_models::{Chunk, Inventory, PendingWork, TransferOutcome};
use futures::stream::{self, StreamExt as _, TryStreamExt as _};

use crate::config::MirrorConfig;
use crate::diff::{self, PartitionDiff};
use crate::dispatch::UploadDispatcher;
use crate::failure_record::FailureRecord;
use crate::progress::{ProgressCallback, null_progress};
use crate::store::{RemoteStore, StoreError};
use crate::{MirrorError, local, plan};

/// Stages of a run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunStage {
    /// Listing partitions on both sides.
    Scanning,
    /// Comparing partitions, then files within shared partitions.
    Diffing,
    /// Splitting pending files into chunks.
    Planning,
    /// Uploading chunks concurrently.
    Dispatching,
    /// All chunks joined.
    Done,
}

impl std::fmt::Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Scanning => "SCANNING",
            Self::Diffing => "DIFFING",
            Self::Planning => "PLANNING",
            Self::Dispatching => "DISPATCHING",
            Self::Done => "DONE",
        })
    }
}

/// Result of scanning, diffing, and planning. Read-only once built.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Number of partitions found locally.
    pub local_partitions: usize,
    /// Number of partitions found remotely.
    pub remote_partitions: usize,
    /// Partition-level comparison.
    pub partitions: PartitionDiff,
    /// Files to upload.
    pub pending: PendingWork,
    /// Units of concurrent work covering `pending` exactly.
    pub chunks: Vec<Chunk>,
    /// Time spent scanning, diffing, and planning.
    pub elapsed: Duration,
}

/// Summary of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// What was planned.
    pub plan: Plan,
    /// Sum of all chunk outcomes.
    pub outcome: TransferOutcome,
    /// Wall time of planning plus dispatch.
    pub elapsed: Duration,
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} local / {} remote partition(s), {} pending file(s) in {} chunk(s): {} in {:.1}s",
            self.plan.local_partitions,
            self.plan.remote_partitions,
            self.plan.pending.total_files(),
            self.plan.chunks.len(),
            self.outcome,
            self.elapsed.as_secs_f64()
        )
    }
}

/// One configured mirror between a local directory and a bucket.
pub struct Mirror {
    config: MirrorConfig,
    store: Arc<dyn RemoteStore>,
    progress: Arc<dyn ProgressCallback>,
}

impl Mirror {
    /// Validates `config` and binds it to `store`.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Config`] if the config is invalid.
    pub fn new(config: MirrorConfig, store: Arc<dyn RemoteStore>) -> Result<Self, MirrorError> {
        config.validate()?;
        Ok(Self {
            config,
            store,
            progress: null_progress(),
        })
    }

    /// Reports one unit per attempted upload to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// The validated configuration.
    #[must_use]
    pub const fn config(&self) -> &MirrorConfig {
        &self.config
    }

    /// Scans both sides, diffs them, and plans chunks. Uploads nothing.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Io`] if the working directory cannot be read
    /// and [`MirrorError::RemoteUnavailable`] if any remote listing fails.
    pub async fn plan(&self) -> Result<Plan, MirrorError> {
        let start = Instant::now();
        log::info!("[{}] {}", RunStage::Scanning, self.config.working_dir.display());
        let local_partitions = self.scan_local_partitions().await?;
        let remote_partitions = self
            .store
            .list_partitions()
            .await
            .map_err(MirrorError::RemoteUnavailable)?;
        log::info!(
            "Found {} remote partition(s) in s3://{}",
            remote_partitions.len(),
            self.config.bucket
        );

        log::info!("[{}] mode={}", RunStage::Diffing, self.config.diff_mode);
        let partitions = diff::diff_partitions(&local_partitions, &remote_partitions);
        if !partitions.remote_only.is_empty() {
            log::warn!(
                "{} partition(s) exist only remotely and are left alone: {}",
                partitions.remote_only.len(),
                join_names(&partitions.remote_only)
            );
        }
        if !partitions.local_only.is_empty() && !self.config.diff_mode.schedules_new_partitions() {
            log::info!(
                "{} partition(s) missing remotely are skipped in {} mode: {}",
                partitions.local_only.len(),
                self.config.diff_mode,
                join_names(&partitions.local_only)
            );
        }

        let local = self
            .scan_local_files(partitions.local_scan_targets(self.config.diff_mode))
            .await?;
        let remote = self
            .scan_remote_files(partitions.remote_scan_targets())
            .await?;
        let pending = diff::pending_work(&partitions, self.config.diff_mode, &local, &remote);

        log::info!(
            "[{}] {} pending file(s) across {} partition(s)",
            RunStage::Planning,
            pending.total_files(),
            pending.partition_count()
        );
        let chunks = plan::plan(&pending, self.config.granularity, self.config.chunk_size());

        Ok(Plan {
            local_partitions: local_partitions.len(),
            remote_partitions: remote_partitions.len(),
            partitions,
            pending,
            chunks,
            elapsed: start.elapsed(),
        })
    }

    /// Uploads every chunk of `plan`, at most `concurrency` chunks at a time,
    /// and waits for all of them.
    pub async fn dispatch(&self, plan: &Plan) -> Vec<TransferOutcome> {
        log::info!(
            "[{}] {} chunk(s), concurrency={}",
            RunStage::Dispatching,
            plan.chunks.len(),
            self.config.concurrency
        );
        self.progress.set_total(plan.pending.total_files() as u64);

        let dispatcher = UploadDispatcher::new(
            Arc::clone(&self.store),
            &self.config.working_dir,
            &self.config.data_subdir,
            Arc::new(FailureRecord::new(&self.config.failure_log)),
            Arc::clone(&self.progress),
        );

        stream::iter(&plan.chunks)
            .map(|chunk| dispatcher.dispatch(chunk))
            .buffer_unordered(self.config.concurrency)
            .collect()
            .await
    }

    /// Dispatches `plan` and summarizes the outcome.
    pub async fn execute(&self, plan: Plan) -> RunReport {
        let start = Instant::now();
        let mut outcome = TransferOutcome::default();
        for chunk in self.dispatch(&plan).await {
            outcome.merge(chunk);
        }
        self.progress.finish(outcome.to_string());

        let report = RunReport {
            elapsed: plan.elapsed + start.elapsed(),
            plan,
            outcome,
        };
        log::info!("[{}] {report}", RunStage::Done);
        if outcome.failed > 0 {
            log::warn!(
                "{} failed upload(s) recorded in {}",
                outcome.failed,
                self.config.failure_log.display()
            );
        }
        report
    }

    /// Plans and dispatches a full run.
    ///
    /// # Errors
    ///
    /// Only the fatal scan errors of [`plan`](Self::plan). Upload failures
    /// are counted in the report and written to the failure record.
    pub async fn run(&self) -> Result<RunReport, MirrorError> {
        let plan = self.plan().await?;
        Ok(self.execute(plan).await)
    }

    async fn scan_local_partitions(&self) -> Result<BTreeSet<String>, MirrorError> {
        let dir = self.config.working_dir.clone();
        tokio::task::spawn_blocking(move || local::list_partitions(&dir)).await?
    }

    async fn scan_local_files(&self, targets: BTreeSet<String>) -> Result<Inventory, MirrorError> {
        let dir = self.config.working_dir.clone();
        let data_subdir = self.config.data_subdir.clone();
        let inventory = tokio::task::spawn_blocking(move || {
            targets
                .into_iter()
                .map(|partition| {
                    let files = local::list_files(&dir, &partition, &data_subdir);
                    (partition, files)
                })
                .collect::<Inventory>()
        })
        .await?;
        Ok(inventory)
    }

    async fn scan_remote_files(&self, targets: &BTreeSet<String>) -> Result<Inventory, MirrorError> {
        let listings: Vec<(String, BTreeSet<String>)> = stream::iter(targets)
            .map(|partition| async move {
                let files = self.store.list_files(partition).await?;
                log::debug!("s3://{}/{partition}/: {} object(s)", self.config.bucket, files.len());
                Ok::<_, StoreError>((partition.clone(), files))
            })
            .buffer_unordered(self.config.concurrency)
            .try_collect()
            .await
            .map_err(MirrorError::RemoteUnavailable)?;

        Ok(listings.into_iter().collect())
    }
}

fn join_names(names: &BTreeSet<String>) -> String {
    names.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}
