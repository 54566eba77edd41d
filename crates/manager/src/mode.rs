//! The mode controller: holds the currently active mode and serializes
//! swaps between them (spec.md §3 "Mode", §4.2).
//!
//! Modeled as a tagged union per the polymorphic-mode design note (spec.md
//! §9): `BuildMode` carries no mode-specific resources (build operations
//! run against the manager's shared catalog and locks regardless of which
//! mode is active, gated only by the `is_build`/`is_search` checks those
//! operations make), while `SearchMode` owns the one resource that really
//! is mode-instance-scoped: a `DiskCache` and its lazily opened readers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, RwLockReadGuard};
use vectoriadb_core::Status;
use vectoriadb_store::{DiskCache, IndexReader};

use crate::gate::OperationGate;

pub struct BuildMode;

pub struct SearchMode {
  pub cache: Arc<DiskCache>,
  pub readers: Mutex<HashMap<String, Arc<IndexReader>>>,
}

impl SearchMode {
  pub fn new(disk_cache_memory_consumption: u64) -> Self {
    Self {
      cache: Arc::new(DiskCache::new(disk_cache_memory_consumption)),
      readers: Mutex::new(HashMap::new()),
    }
  }
}

pub enum ActiveMode {
  Build(BuildMode),
  Search(SearchMode),
}

impl ActiveMode {
  pub fn is_build(&self) -> bool {
    matches!(self, ActiveMode::Build(_))
  }

  pub fn is_search(&self) -> bool {
    matches!(self, ActiveMode::Search(_))
  }

  pub fn as_search(&self) -> Option<&SearchMode> {
    match self {
      ActiveMode::Search(search) => Some(search),
      ActiveMode::Build(_) => None,
    }
  }

  /// `shutdown()` on the outgoing mode (spec.md §4.2 step 5, §3 lifecycle:
  /// "IndexReader: ... closed on mode shutdown"; §4.4: "close every open
  /// reader, then close the DiskCache").
  async fn shutdown(&self) {
    if let ActiveMode::Search(search) = self {
      search.readers.lock().await.clear();
      // `DiskCache` has no I/O to flush on close; dropping the readers map
      // and letting the `Arc<DiskCache>` go out of scope with the mode is
      // sufficient teardown.
    }
  }
}

/// Serializes mode swaps behind `modeLock` and implements the swap
/// protocol in spec.md §4.2.
pub struct ModeController {
  gate: Arc<OperationGate>,
  mode_lock: Mutex<()>,
  active: RwLock<ActiveMode>,
}

impl ModeController {
  pub fn new(gate: Arc<OperationGate>, initial: ActiveMode) -> Self {
    Self {
      gate,
      mode_lock: Mutex::new(()),
      active: RwLock::new(initial),
    }
  }

  pub async fn is_build(&self) -> bool {
    self.active.read().await.is_build()
  }

  pub async fn is_search(&self) -> bool {
    self.active.read().await.is_search()
  }

  /// Borrow whichever mode is currently active. The guard may be held
  /// across further `.await` points so a caller can look up or insert an
  /// `IndexReader` without re-acquiring the lock.
  pub async fn read(&self) -> RwLockReadGuard<'_, ActiveMode> {
    self.active.read().await
  }

  /// `switchToBuildMode`: drains without a deadline (spec.md §4.1).
  pub async fn switch_to_build(&self) -> Result<(), Status> {
    let _mode_lock = self.mode_lock.lock().await;
    if self.active.read().await.is_build() {
      return Ok(());
    }
    let drain = self.gate.drain().await;
    if self.gate.is_closed() {
      drop(drain);
      return Err(Status::unavailable("index manager is shut down"));
    }
    self.active.read().await.shutdown().await;
    *self.active.write().await = ActiveMode::Build(BuildMode);
    drop(drain);
    Ok(())
  }

  /// `switchToSearchMode`: drains with a 5 s deadline (spec.md §4.1).
  pub async fn switch_to_search(&self, disk_cache_memory_consumption: u64) -> Result<(), Status> {
    let _mode_lock = self.mode_lock.lock().await;
    if self.active.read().await.is_search() {
      return Ok(());
    }
    let drain = self.gate.drain_timeout(Duration::from_secs(5)).await?;
    if self.gate.is_closed() {
      drop(drain);
      return Err(Status::unavailable("index manager is shut down"));
    }
    self.active.read().await.shutdown().await;
    *self.active.write().await = ActiveMode::Search(SearchMode::new(disk_cache_memory_consumption));
    drop(drain);
    Ok(())
  }

  /// Final teardown: drains indefinitely with 5 s retries, closes the
  /// outgoing mode, and marks the gate permanently closed.
  pub async fn shutdown(&self) {
    let _mode_lock = self.mode_lock.lock().await;
    self.gate.shutdown_drain().await;
    self.active.read().await.shutdown().await;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn swap_to_same_mode_is_a_noop() {
    let gate = Arc::new(OperationGate::new());
    let controller = ModeController::new(Arc::clone(&gate), ActiveMode::Build(BuildMode));
    controller.switch_to_build().await.unwrap();
    assert!(controller.is_build().await);
  }

  #[tokio::test]
  async fn swap_build_to_search_and_back() {
    let gate = Arc::new(OperationGate::new());
    let controller = ModeController::new(Arc::clone(&gate), ActiveMode::Build(BuildMode));

    controller.switch_to_search(1024).await.unwrap();
    assert!(controller.is_search().await);

    controller.switch_to_build().await.unwrap();
    assert!(controller.is_build().await);
  }

  #[tokio::test]
  async fn search_mode_swap_rejects_after_shutdown() {
    let gate = Arc::new(OperationGate::new());
    let controller = ModeController::new(Arc::clone(&gate), ActiveMode::Build(BuildMode));
    controller.shutdown().await;
    let err = controller.switch_to_search(1024).await.unwrap_err();
    assert_eq!(err.code, vectoriadb_core::Code::Unavailable);
  }
}
