//! Chunk planner.
//!
//! Chunk boundaries are positional slices of each partition's pending list,
//! so the same pending set always yields the same chunks.

use std::num::NonZeroUsize;

use bucket_mirror_models::{Chunk, Granularity, PendingWork};

/// Splits every partition's pending files into contiguous chunks of at most
/// `chunk_size` files. The last chunk of a partition may be shorter.
#[must_use]
pub fn plan_chunks(pending: &PendingWork, chunk_size: NonZeroUsize) -> Vec<Chunk> {
    pending
        .iter()
        .flat_map(|(partition, files)| {
            files.chunks(chunk_size.get()).map(move |slice| Chunk {
                partition: partition.to_string(),
                files: slice.to_vec(),
            })
        })
        .collect()
}

/// Emits one chunk per partition carrying all of its pending files.
#[must_use]
pub fn plan_partitions(pending: &PendingWork) -> Vec<Chunk> {
    pending
        .iter()
        .map(|(partition, files)| Chunk {
            partition: partition.to_string(),
            files: files.to_vec(),
        })
        .collect()
}

/// Plans chunks for the configured granularity.
#[must_use]
pub fn plan(pending: &PendingWork, granularity: Granularity, chunk_size: NonZeroUsize) -> Vec<Chunk> {
    match granularity {
        Granularity::File => plan_chunks(pending, chunk_size),
        Granularity::Partition => plan_partitions(pending),
    }
}
