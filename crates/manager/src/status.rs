//! Durable per-index status and metadata file I/O (spec.md §3, §6).
//!
//! Status writes go to a temp file in the same directory and are renamed
//! atomically (`ATOMIC_MOVE`), falling back to a non-atomic copy-then-remove
//! if the platform refuses the rename. The metadata file is written once,
//! with write + sync + create-new.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use vectoriadb_core::{Distance, IndexState, ParseDistanceError, ParseStateError};

pub const STATUS_FILE: &str = "status";
pub const METADATA_FILE: &str = "metadata";

#[derive(Error, Debug)]
pub enum StatusError {
  #[error("IO error on {path}: {source}")]
  Io { path: PathBuf, source: std::io::Error },
  #[error("unrecognized state in {path}: {source}")]
  State { path: PathBuf, source: ParseStateError },
  #[error("unrecognized distance in {path}: {source}")]
  Distance { path: PathBuf, source: ParseDistanceError },
}

pub fn status_path(index_dir: &Path) -> PathBuf {
  index_dir.join(STATUS_FILE)
}

pub fn metadata_path(index_dir: &Path) -> PathBuf {
  index_dir.join(METADATA_FILE)
}

/// Durably persist `state` as `index_dir`'s status file.
pub fn write_status(index_dir: &Path, state: IndexState) -> Result<(), StatusError> {
  atomic_write(&status_path(index_dir), state.as_str().as_bytes())
}

pub fn read_status(index_dir: &Path) -> Result<IndexState, StatusError> {
  let path = status_path(index_dir);
  let content = fs::read_to_string(&path).map_err(|source| StatusError::Io { path: path.clone(), source })?;
  content.trim().parse().map_err(|source| StatusError::State { path, source })
}

/// Write the metadata file once (spec.md §6: "write+sync+create-new"). A
/// second call against the same index is a bug on the caller's part, not
/// something this function tries to recover from.
pub fn write_metadata(index_dir: &Path, distance: Distance) -> Result<(), StatusError> {
  let path = metadata_path(index_dir);
  let mut file = OpenOptions::new()
    .write(true)
    .create_new(true)
    .open(&path)
    .map_err(|source| StatusError::Io { path: path.clone(), source })?;
  file
    .write_all(distance.as_str().as_bytes())
    .map_err(|source| StatusError::Io { path: path.clone(), source })?;
  file.sync_all().map_err(|source| StatusError::Io { path, source })?;
  Ok(())
}

pub fn read_metadata(index_dir: &Path) -> Result<Distance, StatusError> {
  let path = metadata_path(index_dir);
  let content = fs::read_to_string(&path).map_err(|source| StatusError::Io { path: path.clone(), source })?;
  content.trim().parse().map_err(|source| StatusError::Distance { path, source })
}

fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), StatusError> {
  let dir = path.parent().unwrap_or_else(|| Path::new("."));
  let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("status");
  let tmp_path = dir.join(format!(".{file_name}.tmp"));

  {
    let mut tmp = File::create(&tmp_path).map_err(|source| StatusError::Io {
      path: tmp_path.clone(),
      source,
    })?;
    tmp.write_all(bytes).map_err(|source| StatusError::Io {
      path: tmp_path.clone(),
      source,
    })?;
    tmp.sync_all().map_err(|source| StatusError::Io {
      path: tmp_path.clone(),
      source,
    })?;
  }

  if fs::rename(&tmp_path, path).is_err() {
    fs::copy(&tmp_path, path).map_err(|source| StatusError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    let _ = fs::remove_file(&tmp_path);
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn status_round_trips() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("idx")).unwrap();
    let index_dir = dir.path().join("idx");
    write_status(&index_dir, IndexState::Uploaded).unwrap();
    assert_eq!(read_status(&index_dir).unwrap(), IndexState::Uploaded);

    write_status(&index_dir, IndexState::Built).unwrap();
    assert_eq!(read_status(&index_dir).unwrap(), IndexState::Built);
  }

  #[test]
  fn metadata_round_trips_and_rejects_second_write() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("idx")).unwrap();
    let index_dir = dir.path().join("idx");
    write_metadata(&index_dir, Distance::Cosine).unwrap();
    assert_eq!(read_metadata(&index_dir).unwrap(), Distance::Cosine);
    assert!(write_metadata(&index_dir, Distance::L2).is_err());
  }

  #[test]
  fn missing_status_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    assert!(read_status(dir.path()).is_err());
  }
}
