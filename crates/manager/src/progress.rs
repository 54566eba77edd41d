//! Progress tracker: a periodic (5 s) broadcaster of build progress to
//! subscribed listeners (spec.md §4.7).
//!
//! The core tracker just fans snapshots out over `mpsc` channels; the
//! listener-cancellation wrapper around a real streaming response observer
//! (spec.md §9's flagged cancellation-ordering and double-`onError` bugs)
//! belongs to the RPC transport that owns an actual client stream, not this
//! manager-internal plumbing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use vectoriadb_core::BuildProgress;

const TICK: Duration = Duration::from_secs(5);

pub struct ProgressTracker {
  current: Mutex<HashMap<String, BuildProgress>>,
  listeners: Mutex<Vec<mpsc::Sender<BuildProgress>>>,
}

impl ProgressTracker {
  /// Spawn the tracker and its periodic broadcast task.
  pub fn spawn() -> Arc<Self> {
    let tracker = Arc::new(Self {
      current: Mutex::new(HashMap::new()),
      listeners: Mutex::new(Vec::new()),
    });
    let ticker = Arc::clone(&tracker);
    tokio::spawn(async move {
      let mut interval = tokio::time::interval(TICK);
      loop {
        interval.tick().await;
        ticker.broadcast();
      }
    });
    tracker
  }

  /// Record the latest known progress snapshot for an index. Called by the
  /// build worker as phases complete.
  pub fn record(&self, progress: BuildProgress) {
    self.current.lock().unwrap().insert(progress.index_name.clone(), progress);
  }

  /// Drop an index's progress once it leaves the build pipeline (success,
  /// failure, or drop).
  pub fn clear(&self, index_name: &str) {
    self.current.lock().unwrap().remove(index_name);
  }

  /// Subscribe to future ticks. Each tick delivers one snapshot per index
  /// currently tracked.
  pub fn subscribe(&self) -> mpsc::Receiver<BuildProgress> {
    let (tx, rx) = mpsc::channel(32);
    self.listeners.lock().unwrap().push(tx);
    rx
  }

  pub fn listener_count(&self) -> usize {
    self.listeners.lock().unwrap().len()
  }

  fn broadcast(&self) {
    let snapshot: Vec<BuildProgress> = self.current.lock().unwrap().values().cloned().collect();
    self.listeners.lock().unwrap().retain(|tx| {
      // A full or closed channel means the listener is gone or stalled;
      // either way it self-removes (spec.md §4.7: "self-removes on
      // client-side errors").
      snapshot.iter().all(|progress| tx.try_send(progress.clone()).is_ok())
    });
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use vectoriadb_core::BuildPhase;

  fn progress(name: &str) -> BuildProgress {
    BuildProgress {
      index_name: name.to_string(),
      phases: vec![BuildPhase {
        name: "scan".to_string(),
        completion_percentage: 50,
        parameters: vec![],
      }],
    }
  }

  #[tokio::test]
  async fn subscribers_receive_recorded_progress_on_tick() {
    let tracker = ProgressTracker::spawn();
    tracker.record(progress("a"));
    let mut rx = tracker.subscribe();
    assert_eq!(tracker.listener_count(), 1);

    let received = tokio::time::timeout(Duration::from_secs(6), rx.recv()).await.unwrap().unwrap();
    assert_eq!(received.index_name, "a");
  }

  #[tokio::test]
  async fn dropped_receiver_causes_self_removal() {
    let tracker = ProgressTracker::spawn();
    tracker.record(progress("a"));
    let rx = tracker.subscribe();
    drop(rx);

    tokio::time::sleep(Duration::from_millis(10)).await;
    // Force a broadcast without waiting a full 5s tick.
    tracker.broadcast();
    assert_eq!(tracker.listener_count(), 0);
  }
}
