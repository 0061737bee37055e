//! Fatal error taxonomy for a mirror run.
//!
//! Only failures that make the inventory or the difference untrustworthy
//! live here. Per-file upload failures are recovered inside the dispatcher
//! and never surface as a [`MirrorError`].

use std::path::PathBuf;

use crate::store::StoreError;

/// Errors that halt a mirror run before any upload is dispatched.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    /// The local working directory is missing or unreadable.
    #[error("Failed to read local inventory at {}: {source}", path.display())]
    Io {
        /// Directory that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The remote listing could not be completed (auth, connectivity, or
    /// service failure).
    #[error("Remote store unavailable: {0}")]
    RemoteUnavailable(#[source] StoreError),

    /// The configuration failed validation or could not be parsed.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A blocking scan task panicked or was cancelled.
    #[error("Local scan task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
