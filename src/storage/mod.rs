//! Storage module for the harvested dataset
//!
//! This module handles:
//! - The `RecordStore` abstraction over the cumulative dataset
//! - Parquet persistence of records (one row per record)
//! - Merging a run's batch onto everything harvested before

mod parquet_store;
mod schema;

pub use parquet_store::ParquetStore;
pub use schema::{batch_to_records, dataset_schema, records_to_batch};

use crate::record::Record;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while reading or writing the dataset
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),

    #[error("Dataset schema mismatch: {0}")]
    Schema(String),
}

/// Result type for persistence operations
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// A durable, append-only collection of records
///
/// A store always holds the complete dataset. Merging reads everything,
/// appends, and replaces the whole content in one step.
pub trait RecordStore {
    /// Reads every stored record in order; a store that was never written is
    /// empty
    fn load(&self) -> PersistenceResult<Vec<Record>>;

    /// Replaces the stored dataset with `records`
    fn replace(&mut self, records: &[Record]) -> PersistenceResult<()>;

    /// Number of stored records
    fn row_count(&self) -> PersistenceResult<usize> {
        Ok(self.load()?.len())
    }
}

/// Row counts before and after a merge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeSummary {
    pub previous_rows: usize,
    pub appended: usize,
    pub total_rows: usize,
}

impl MergeSummary {
    pub fn is_noop(&self) -> bool {
        self.appended == 0
    }
}

/// Appends `new_records` to the store's dataset
///
/// An empty batch leaves the store untouched. Records are not deduplicated
/// against what is already stored.
///
/// # Arguments
///
/// * `store` - The dataset to extend
/// * `new_records` - Records from the latest run, in harvest order
///
/// # Returns
///
/// * `Ok(MergeSummary)` - Row counts before and after
/// * `Err(PersistenceError)` - The dataset could not be read or replaced; the
///   stored content is unchanged
pub fn merge<S: RecordStore + ?Sized>(
    store: &mut S,
    new_records: &[Record],
) -> PersistenceResult<MergeSummary> {
    if new_records.is_empty() {
        let rows = store.row_count()?;
        tracing::debug!("Nothing to merge, dataset stays at {} rows", rows);
        return Ok(MergeSummary {
            previous_rows: rows,
            appended: 0,
            total_rows: rows,
        });
    }

    let mut records = store.load()?;
    let previous_rows = records.len();
    records.extend_from_slice(new_records);
    store.replace(&records)?;

    let summary = MergeSummary {
        previous_rows,
        appended: new_records.len(),
        total_rows: records.len(),
    };
    tracing::info!(
        "Merged {} records into dataset ({} -> {} rows)",
        summary.appended,
        summary.previous_rows,
        summary.total_rows
    );
    Ok(summary)
}

/// Appends `new_records` to the Parquet dataset at `path`
pub fn merge_into_path(new_records: &[Record], path: &Path) -> PersistenceResult<MergeSummary> {
    let mut store = ParquetStore::new(path);
    merge(&mut store, new_records)
}
