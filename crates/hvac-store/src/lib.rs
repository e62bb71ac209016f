//! HVAC monitor sample storage.
//!
//! This crate provides:
//! - The SQLite-backed [`SampleStore`] keyed by sample time
//! - Idempotent schema creation on every open
//! - The [`SampleWriter`] seam used by the ingestion pipeline

pub mod error;
pub mod store;

pub use error::StorageError;
pub use store::{InsertOutcome, SampleStore, SampleWriter, StoreOptions, CREATE_TABLE_SQL};
