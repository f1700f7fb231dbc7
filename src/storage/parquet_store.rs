//! Parquet-backed record store
//!
//! The dataset lives in a single Parquet file. Writes go to a sibling
//! `<name>.tmp` file which is then renamed over the target, so a crash
//! mid-write leaves the previous dataset intact.

use crate::record::Record;
use crate::storage::schema::{batch_to_records, records_to_batch};
use crate::storage::{PersistenceResult, RecordStore};
use arrow_array::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Record store backed by one Parquet file
#[derive(Debug, Clone)]
pub struct ParquetStore {
    path: PathBuf,
}

impl ParquetStore {
    /// Creates a store for `path`; nothing is touched until the first write
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "dataset.parquet".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl RecordStore for ParquetStore {
    fn load(&self) -> PersistenceResult<Vec<Record>> {
        if !self.exists() {
            tracing::debug!("No dataset at {}, starting empty", self.path.display());
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

        let mut records = Vec::new();
        for batch in reader {
            records.extend(batch_to_records(&batch?)?);
        }
        Ok(records)
    }

    fn replace(&mut self, records: &[Record]) -> PersistenceResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let batch = records_to_batch(records)?;
        let temp_path = self.temp_path();

        if let Err(e) = write_batch(&temp_path, &batch) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }

        fs::rename(&temp_path, &self.path)?;
        tracing::debug!(
            "Wrote {} rows to {}",
            records.len(),
            self.path.display()
        );
        Ok(())
    }

    fn row_count(&self) -> PersistenceResult<usize> {
        if !self.exists() {
            return Ok(0);
        }

        let file = File::open(&self.path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        let rows = builder.metadata().file_metadata().num_rows();
        Ok(usize::try_from(rows).unwrap_or_default())
    }
}

/// Writes one batch to a fresh file and syncs it to disk
fn write_batch(path: &Path, batch: &RecordBatch) -> PersistenceResult<()> {
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(batch)?;
    let file = writer.into_inner()?;
    file.sync_all()?;
    Ok(())
}
