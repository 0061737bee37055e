//! The remote object store seam.
//!
//! The engine only needs three capabilities from a store: enumerate the
//! top-level partitions, enumerate the files under one partition, and put a
//! single local file under an explicit key. Listings must be complete; a
//! store that returns a partial listing would make the difference engine
//! schedule files that are already mirrored.

#[cfg(test)]
pub mod memory;

use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;

/// Errors raised by a [`RemoteStore`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Listing objects (or prefixes) failed.
    #[error("Failed to list s3://{bucket}/{prefix}: {source}")]
    List {
        /// Bucket name.
        bucket: String,
        /// Key prefix being listed.
        prefix: String,
        /// Underlying SDK error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Uploading a single object failed.
    #[error("Failed to upload s3://{bucket}/{key}: {source}")]
    Upload {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Underlying SDK error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Reading the local file to upload failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A remote object store holding the mirror.
///
/// Objects are keyed `"{partition}/{file_name}"`.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Lists every top-level key prefix (without the trailing `/`).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::List`] if any page of the listing fails.
    async fn list_partitions(&self) -> Result<BTreeSet<String>, StoreError>;

    /// Lists every key suffix under `"{partition}/"`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::List`] if any page of the listing fails.
    async fn list_files(&self, partition: &str) -> Result<BTreeSet<String>, StoreError>;

    /// Uploads the whole file at `local_path` to `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the local file cannot be read and
    /// [`StoreError::Upload`] if the put is rejected.
    async fn put_file(&self, key: &str, local_path: &Path) -> Result<(), StoreError>;
}

/// Builds the object key for a file within a partition.
#[must_use]
pub fn object_key(partition: &str, file_name: &str) -> String {
    format!("{partition}/{file_name}")
}
