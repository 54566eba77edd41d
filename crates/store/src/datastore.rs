//! `DataStore`: an append-only writer of raw vectors into a per-index
//! directory (spec.md §1, §3 lifecycle: "created when the first chunk of an
//! upload arrives; closed on stream completion or stream error").

use crate::format::write_record;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("vector has {actual} components, expected {expected}")]
  DimensionMismatch { expected: usize, actual: usize },
}

pub const RAW_DATA_FILE: &str = "vectors.raw";

/// Append-only writer for one index's raw vector stream.
pub struct DataStore {
  writer: BufWriter<File>,
  dims: usize,
  count: u64,
}

impl DataStore {
  /// Create (or truncate) the raw data file for `index_dir`.
  pub fn create(index_dir: &Path, dims: usize) -> Result<Self, StoreError> {
    fs::create_dir_all(index_dir)?;
    let path = index_dir.join(RAW_DATA_FILE);
    let file = File::create(path)?;
    Ok(Self {
      writer: BufWriter::new(file),
      dims,
      count: 0,
    })
  }

  pub fn raw_data_path(index_dir: &Path) -> PathBuf {
    index_dir.join(RAW_DATA_FILE)
  }

  /// Append one `(vector, id)` pair. The vector's length must match the
  /// configured dimensionality (spec.md §4.3: "A chunk whose component
  /// count differs from the configured dimensionality is rejected with
  /// invalid-argument" — the caller maps `DimensionMismatch` to that code).
  pub fn append(&mut self, vector: &[f32], id: &[u8]) -> Result<(), StoreError> {
    if vector.len() != self.dims {
      return Err(StoreError::DimensionMismatch {
        expected: self.dims,
        actual: vector.len(),
      });
    }
    write_record(&mut self.writer, id, vector)?;
    self.count += 1;
    Ok(())
  }

  pub fn count(&self) -> u64 {
    self.count
  }

  /// Flush and durably close the data store.
  pub fn close(mut self) -> Result<(), StoreError> {
    self.writer.flush()?;
    self.writer.get_ref().sync_all()?;
    Ok(())
  }
}
