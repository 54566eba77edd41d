//! `DiskCache`: a process-wide page cache for index files, sized at
//! Search-mode construction (spec.md §1, §3, §5). One `DiskCache` is owned
//! exclusively by one `SearchMode` instance and shared across every
//! `IndexReader` it opens.
//!
//! Modeled directly on the teacher's file-content cache
//! (`daemon/src/cache.rs`): a byte-weighted `moka::sync::Cache` keyed by
//! path, sized by `weigher` rather than entry count since index files vary
//! wildly in size.

use moka::sync::Cache;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
  #[error("IO error reading {path:?}: {source}")]
  Io { path: PathBuf, source: std::io::Error },
}

pub struct DiskCache {
  cache: Cache<PathBuf, Arc<Vec<u8>>>,
}

impl DiskCache {
  /// `max_bytes` comes from `MemoryBudget::disk_cache_memory_consumption`.
  pub fn new(max_bytes: u64) -> Self {
    Self {
      cache: Cache::builder()
        .max_capacity(max_bytes)
        .weigher(|_key, value: &Arc<Vec<u8>>| value.len().try_into().unwrap_or(u32::MAX))
        .build(),
    }
  }

  /// Load the full contents of `path`, transparently caching it. Index
  /// files are immutable once built (spec.md §3: "Immutable after
  /// creation" applies to metadata; the built index file is never
  /// mutated in place either), so a cached read never goes stale.
  pub fn load(&self, path: &Path) -> Result<Arc<Vec<u8>>, CacheError> {
    if let Some(cached) = self.cache.get(path) {
      return Ok(cached);
    }
    let bytes = std::fs::read(path).map_err(|source| CacheError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    let bytes = Arc::new(bytes);
    self.cache.insert(path.to_path_buf(), Arc::clone(&bytes));
    Ok(bytes)
  }

  pub fn invalidate(&self, path: &Path) {
    self.cache.invalidate(path);
  }

  pub fn entry_count(&self) -> u64 {
    self.cache.entry_count()
  }

  pub fn weighted_size(&self) -> u64 {
    self.cache.weighted_size()
  }

  #[cfg(test)]
  fn run_pending_tasks(&self) {
    self.cache.run_pending_tasks();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn caches_file_contents() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("index.bin");
    std::fs::write(&path, b"hello").unwrap();

    let cache = DiskCache::new(1024 * 1024);
    let first = cache.load(&path).unwrap();
    assert_eq!(&first[..], b"hello");
    cache.run_pending_tasks();
    assert_eq!(cache.entry_count(), 1);

    // Mutate on disk; cached copy should still be served.
    std::fs::write(&path, b"changed").unwrap();
    let second = cache.load(&path).unwrap();
    assert_eq!(&second[..], b"hello");

    cache.invalidate(&path);
    let third = cache.load(&path).unwrap();
    assert_eq!(&third[..], b"changed");
  }
}
