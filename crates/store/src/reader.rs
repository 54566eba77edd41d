//! `IndexReader`: opens a built index against a shared `DiskCache` and
//! answers k-NN queries (spec.md §1, §4.4). Lazily constructed per index in
//! Search mode and shared across concurrent queries.

use crate::builder::index_file_path;
use crate::cache::{CacheError, DiskCache};
use crate::format::{Header, RecordReader};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use vectoriadb_core::distance::Distance;

#[derive(Error, Debug)]
pub enum ReaderError {
  #[error(transparent)]
  Cache(#[from] CacheError),
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("query has {actual} components, expected {expected}")]
  DimensionMismatch { expected: usize, actual: usize },
}

pub struct IndexReader {
  cache: Arc<DiskCache>,
  path: PathBuf,
  distance: Distance,
}

struct Candidate {
  distance: f32,
  id: Vec<u8>,
}

impl PartialEq for Candidate {
  fn eq(&self, other: &Self) -> bool {
    self.distance == other.distance
  }
}
impl Eq for Candidate {}
impl PartialOrd for Candidate {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}
impl Ord for Candidate {
  fn cmp(&self, other: &Self) -> Ordering {
    // Max-heap on distance so `peek`/`pop` discards the current worst
    // candidate once the heap holds `k` entries.
    self.distance.partial_cmp(&other.distance).unwrap_or(Ordering::Equal)
  }
}

impl IndexReader {
  /// Open `index_dir`'s built index file, backed by `cache`.
  pub fn open(index_dir: &Path, distance: Distance, cache: Arc<DiskCache>) -> Result<Self, ReaderError> {
    let path = index_file_path(index_dir);
    // Touch the file once up front so a missing/corrupt index surfaces at
    // open time rather than on the first query.
    let bytes = cache.load(&path)?;
    Header::read(&mut &bytes[..])?;
    Ok(Self { cache, path, distance })
  }

  /// Exact k-nearest-neighbour scan (spec.md §8: "k = 0 returns an empty id
  /// list" holds trivially here since the heap never grows past `k`).
  pub fn query(&self, query: &[f32], k: usize) -> Result<Vec<Vec<u8>>, ReaderError> {
    let bytes = self.cache.load(&self.path)?;
    let header = Header::read(&mut &bytes[..])?;
    let dims = header.dims as usize;
    if query.len() != dims {
      return Err(ReaderError::DimensionMismatch {
        expected: dims,
        actual: query.len(),
      });
    }
    if k == 0 {
      return Ok(Vec::new());
    }

    let body = &bytes[Header::LEN..];
    let mut reader = RecordReader::new(body, dims);
    let mut heap = std::collections::BinaryHeap::with_capacity(k + 1);

    while let Some(record) = reader.next() {
      let d = self.distance.distance(query, record.vector);
      if heap.len() < k {
        heap.push(Candidate {
          distance: d,
          id: record.id.to_vec(),
        });
      } else if let Some(worst) = heap.peek()
        && d < worst.distance
      {
        heap.pop();
        heap.push(Candidate {
          distance: d,
          id: record.id.to_vec(),
        });
      }
    }

    let mut results: Vec<Candidate> = heap.into_vec();
    results.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));
    Ok(results.into_iter().map(|c| c.id).collect())
  }

  /// Delete the underlying index file and evict it from the shared cache
  /// (spec.md §4.4: `dropIndex` "call `deleteIndex()` on the reader").
  pub fn delete_index(&self) -> Result<(), ReaderError> {
    self.cache.invalidate(&self.path);
    if self.path.exists() {
      std::fs::remove_file(&self.path)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::builder::{BuildParams, build};
  use crate::datastore::DataStore;
  use tempfile::TempDir;

  fn build_fixture(dir: &Path) {
    let mut store = DataStore::create(dir, 2).unwrap();
    store.append(&[0.0, 0.0], b"origin").unwrap();
    store.append(&[1.0, 0.0], b"east").unwrap();
    store.append(&[0.0, 5.0], b"far-north").unwrap();
    store.close().unwrap();

    build(
      dir,
      BuildParams {
        dims: 2,
        max_connections_per_vertex: 16,
        max_candidates_returned: 64,
        compression_ratio: 8,
        distance_multiplier: 1.0,
        max_memory_consumption: 1 << 20,
      },
      |_| {},
    )
    .unwrap();
  }

  #[test]
  fn returns_nearest_neighbour() {
    let dir = TempDir::new().unwrap();
    build_fixture(dir.path());

    let cache = Arc::new(DiskCache::new(1 << 20));
    let reader = IndexReader::open(dir.path(), Distance::L2, cache).unwrap();

    let ids = reader.query(&[0.0, 0.0], 1).unwrap();
    assert_eq!(ids, vec![b"origin".to_vec()]);

    let ids = reader.query(&[0.9, 0.0], 2).unwrap();
    assert_eq!(ids[0], b"east".to_vec());
  }

  #[test]
  fn k_zero_returns_empty() {
    let dir = TempDir::new().unwrap();
    build_fixture(dir.path());
    let cache = Arc::new(DiskCache::new(1 << 20));
    let reader = IndexReader::open(dir.path(), Distance::L2, cache).unwrap();
    assert!(reader.query(&[0.0, 0.0], 0).unwrap().is_empty());
  }

  #[test]
  fn rejects_dimension_mismatch() {
    let dir = TempDir::new().unwrap();
    build_fixture(dir.path());
    let cache = Arc::new(DiskCache::new(1 << 20));
    let reader = IndexReader::open(dir.path(), Distance::L2, cache).unwrap();
    let err = reader.query(&[0.0, 0.0, 0.0], 1).unwrap_err();
    assert!(matches!(err, ReaderError::DimensionMismatch { expected: 2, actual: 3 }));
  }

  #[test]
  fn delete_index_removes_file() {
    let dir = TempDir::new().unwrap();
    build_fixture(dir.path());
    let cache = Arc::new(DiskCache::new(1 << 20));
    let reader = IndexReader::open(dir.path(), Distance::L2, cache).unwrap();
    reader.delete_index().unwrap();
    assert!(!index_file_path(dir.path()).exists());
  }
}
