//! The operation gate: a counting semaphore drain barrier (spec.md §3,
//! §4.1). Every client operation acquires one permit; mode swaps and
//! shutdown acquire the entire budget to drain in-flight work.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use vectoriadb_core::Status;

/// Effectively unbounded concurrency, comfortably within `acquire_many`'s
/// `u32` permit count.
const TOTAL_PERMITS: u32 = 1 << 24;

pub struct OperationGate {
  semaphore: Arc<Semaphore>,
  closed: AtomicBool,
  draining: AtomicBool,
}

/// Holds the fully-drained permit budget and clears the `draining` flag on
/// drop. Dropping this releases the drained permits back to the semaphore.
pub struct DrainGuard<'a> {
  _permit: OwnedSemaphorePermit,
  gate: &'a OperationGate,
}

impl Drop for DrainGuard<'_> {
  fn drop(&mut self) {
    self.gate.draining.store(false, Ordering::Release);
  }
}

impl OperationGate {
  pub fn new() -> Self {
    Self {
      semaphore: Arc::new(Semaphore::new(TOTAL_PERMITS as usize)),
      closed: AtomicBool::new(false),
      draining: AtomicBool::new(false),
    }
  }

  pub fn is_closed(&self) -> bool {
    self.closed.load(Ordering::Acquire)
  }

  /// Acquire one permit for a client operation. Non-blocking: a drain in
  /// progress rejects immediately rather than queuing behind it, matching
  /// "clients that arrive between steps 3 and 7 are rejected with
  /// unavailable" (spec.md §4.2) rather than being made to wait it out.
  pub fn acquire_operation(&self) -> Result<OwnedSemaphorePermit, Status> {
    if self.closed.load(Ordering::Acquire) {
      return Err(Status::unavailable("index manager is shut down"));
    }
    if self.draining.load(Ordering::Acquire) {
      return Err(Status::unavailable("mode swap in progress"));
    }
    Arc::clone(&self.semaphore)
      .try_acquire_owned()
      .map_err(|_| Status::unavailable("mode swap in progress"))
  }

  /// Drain with no deadline (`switchToBuildMode`, spec.md §4.1).
  pub async fn drain(&self) -> DrainGuard<'_> {
    self.draining.store(true, Ordering::Release);
    let permit = Arc::clone(&self.semaphore)
      .acquire_many_owned(TOTAL_PERMITS)
      .await
      .expect("operation gate semaphore is never tokio-closed");
    DrainGuard { _permit: permit, gate: self }
  }

  /// Drain with a deadline (`switchToSearchMode`, spec.md §4.1). Leaves the
  /// semaphore untouched on timeout: the future is simply dropped, which
  /// releases no permits because none were acquired yet.
  pub async fn drain_timeout(&self, timeout: Duration) -> Result<DrainGuard<'_>, Status> {
    self.draining.store(true, Ordering::Release);
    match tokio::time::timeout(timeout, Arc::clone(&self.semaphore).acquire_many_owned(TOTAL_PERMITS)).await {
      Ok(Ok(permit)) => Ok(DrainGuard { _permit: permit, gate: self }),
      _ => {
        self.draining.store(false, Ordering::Release);
        Err(Status::unavailable("timed out waiting to drain in-flight operations"))
      }
    }
  }

  /// Drain with indefinite 5s-interval retries (shutdown, spec.md §4.1,
  /// §5). Marks the gate permanently closed once the drain succeeds.
  pub async fn shutdown_drain(&self) {
    self.draining.store(true, Ordering::Release);
    loop {
      match tokio::time::timeout(Duration::from_secs(5), Arc::clone(&self.semaphore).acquire_many_owned(TOTAL_PERMITS)).await {
        Ok(Ok(permit)) => {
          self.closed.store(true, Ordering::Release);
          drop(permit);
          return;
        }
        _ => {
          tracing::info!("shutdown still waiting for in-flight operations to drain");
        }
      }
    }
  }
}

impl Default for OperationGate {
  fn default() -> Self {
    Self::new()
  }
}
