//! Append-only CSV record store.
//!
//! The store is only ever written by the pipeline, never read back: the
//! header goes in when the file is created, after that every batch is
//! appended as-is. Existing rows are never re-read or rewritten.

use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::models::Batch;

/// Errors that can occur while appending a batch.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store write error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Store write error on {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Persistence sink backed by a single CSV file.
#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a batch, returning the number of rows written.
    ///
    /// An empty batch is a no-op: the file is neither created nor touched, so an
    /// all-failed cycle never leaves a header-only store behind. Failures are
    /// not retried; the next cycle appends its own batch independently.
    pub fn append(&self, batch: &Batch) -> Result<usize, StoreError> {
        if batch.is_empty() {
            tracing::debug!("Empty batch, leaving {} untouched", self.path.display());
            return Ok(0);
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        // A zero-length file (e.g. pre-created by an operator) still needs the header.
        let write_header = match fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == io::ErrorKind::NotFound => true,
            Err(e) => return Err(self.io_error(e)),
        };

        // The whole batch is encoded before the file is opened, so a row that
        // fails to serialize leaves the store untouched.
        let bytes = encode_rows(batch.records(), write_header).map_err(|e| self.csv_error(e))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        file.write_all(&bytes).map_err(|e| self.io_error(e))?;
        file.flush().map_err(|e| self.io_error(e))?;

        if write_header {
            tracing::info!("Created record store {}", self.path.display());
        }

        Ok(batch.len())
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn csv_error(&self, source: csv::Error) -> StoreError {
        StoreError::Csv {
            path: self.path.clone(),
            source,
        }
    }
}

/// Encode rows as CSV in memory, all or nothing.
fn encode_rows<T: Serialize>(rows: &[T], write_header: bool) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(write_header)
        .from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}
