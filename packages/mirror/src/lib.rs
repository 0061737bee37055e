#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Reconciliation and resumable transfer engine.
//!
//! Mirrors a local archive laid out as
//! `{working_dir}/{partition}/{data_subdir}/{file}` into a bucket keyed
//! `{partition}/{file}`, uploading exactly the files the bucket lacks.
//!
//! ## Pipeline
//!
//! 1. [`local`] and a [`store::RemoteStore`] list partitions on each side.
//! 2. [`diff`] compares partitions, then files within shared partitions.
//! 3. [`plan`] splits pending files into bounded chunks.
//! 4. [`dispatch`] uploads each chunk, recording failures in the
//!    [`failure_record`].
//! 5. [`run::Mirror`] drives the chunks concurrently and joins the outcomes.
//!
//! ## Resumability
//!
//! The bucket itself is the only ledger of what has been uploaded. An
//! interrupted run is resumed by running again: the new diff contains only
//! what is still missing.

pub mod config;
pub mod diff;
pub mod dispatch;
mod error;
pub mod failure_record;
pub mod local;
pub mod plan;
pub mod progress;
pub mod run;
pub mod store;

#[cfg(test)]
mod testing;

pub use bucket_mirror_models as models;
pub use config::MirrorConfig;
pub use error::MirrorError;
pub use run::{Mirror, Plan, RunReport, RunStage};
pub use store::{RemoteStore, StoreError};
