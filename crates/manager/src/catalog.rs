//! The index catalog: an in-memory map of index name to `(state,
//! metadata)` with atomic compare-and-set transitions (spec.md §3, §9
//! "Catalog mutation"). A single `RwLock`-guarded `HashMap` gives the same
//! observable guarantee as a per-entry atomic CAS — every mutation takes
//! the write lock, so losers of a race always observe the winning
//! transition — while staying as simple as the teacher's registry
//! (`daemon/src/projects.rs`).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;
use vectoriadb_core::{Distance, IndexState};

/// Distance metric + absolute directory path. Immutable after creation
/// (spec.md §3).
#[derive(Debug, Clone)]
pub struct IndexMetadata {
  pub distance: Distance,
  pub directory: PathBuf,
}

#[derive(Debug, Clone)]
struct Entry {
  state: IndexState,
  metadata: IndexMetadata,
}

#[derive(Default)]
pub struct Catalog {
  entries: RwLock<HashMap<String, Entry>>,
}

impl Catalog {
  pub fn new() -> Self {
    Self::default()
  }

  /// Insert `name` with `state` and `metadata` unless already present.
  /// Returns `false` without mutating anything if the name is taken
  /// (spec.md §3: "creation is serialized so concurrent creates cannot
  /// race on the same name" — the caller also holds `indexCreationLock`,
  /// this is the CAS-over-a-map half of that guarantee).
  pub fn insert_if_absent(&self, name: &str, state: IndexState, metadata: IndexMetadata) -> bool {
    let mut entries = self.entries.write().unwrap();
    if entries.contains_key(name) {
      return false;
    }
    entries.insert(name.to_string(), Entry { state, metadata });
    true
  }

  /// Unconditional insert used by the startup reconciler, which is "the
  /// only path that admits historical on-disk state" (spec.md §4.5).
  pub fn insert_recovered(&self, name: &str, state: IndexState, metadata: IndexMetadata) {
    self.entries.write().unwrap().insert(name.to_string(), Entry { state, metadata });
  }

  pub fn state(&self, name: &str) -> Option<IndexState> {
    self.entries.read().unwrap().get(name).map(|e| e.state)
  }

  pub fn metadata(&self, name: &str) -> Option<IndexMetadata> {
    self.entries.read().unwrap().get(name).map(|e| e.metadata.clone())
  }

  pub fn get(&self, name: &str) -> Option<(IndexState, IndexMetadata)> {
    self.entries.read().unwrap().get(name).map(|e| (e.state, e.metadata.clone()))
  }

  /// Transition `name` from `from` to `to`. `Ok(true)` if it fired,
  /// `Ok(false)` if `name` exists but is in a different state, `Err(())`
  /// if `name` is not cataloged at all.
  pub fn compare_and_set(&self, name: &str, from: IndexState, to: IndexState) -> Result<bool, ()> {
    self.compare_any_and_set(name, &[from], to)
  }

  /// Same as `compare_and_set` but accepts any of several source states
  /// (`buildIndex`'s `CREATED|UPLOADED -> IN_BUILD_QUEUE`, `dropIndex`'s
  /// `{CREATED,BUILT,UPLOADED} -> BROKEN`).
  pub fn compare_any_and_set(&self, name: &str, from: &[IndexState], to: IndexState) -> Result<bool, ()> {
    let mut entries = self.entries.write().unwrap();
    match entries.get_mut(name) {
      None => Err(()),
      Some(entry) if from.contains(&entry.state) => {
        entry.state = to;
        Ok(true)
      }
      Some(_) => Ok(false),
    }
  }

  /// Set the state unconditionally, regardless of the current value. Used
  /// on unrecoverable failure (mark BROKEN) and by `createIndex` when the
  /// `CREATING -> CREATED` CAS loses a race it should never lose.
  pub fn force_set(&self, name: &str, to: IndexState) {
    if let Some(entry) = self.entries.write().unwrap().get_mut(name) {
      entry.state = to;
    }
  }

  pub fn remove(&self, name: &str) -> Option<(IndexState, IndexMetadata)> {
    self.entries.write().unwrap().remove(name).map(|e| (e.state, e.metadata))
  }

  pub fn contains(&self, name: &str) -> bool {
    self.entries.read().unwrap().contains_key(name)
  }

  /// Every cataloged `(name, state)` pair, in no particular order.
  pub fn list(&self) -> Vec<(String, IndexState)> {
    self.entries.read().unwrap().iter().map(|(name, e)| (name.clone(), e.state)).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;
  use std::thread;

  fn meta() -> IndexMetadata {
    IndexMetadata {
      distance: Distance::L2,
      directory: PathBuf::from("/tmp/a"),
    }
  }

  #[test]
  fn insert_if_absent_rejects_duplicates() {
    let catalog = Catalog::new();
    assert!(catalog.insert_if_absent("a", IndexState::Creating, meta()));
    assert!(!catalog.insert_if_absent("a", IndexState::Creating, meta()));
  }

  #[test]
  fn compare_and_set_transitions_and_rejects_mismatch() {
    let catalog = Catalog::new();
    catalog.insert_if_absent("a", IndexState::Creating, meta());
    assert_eq!(catalog.compare_and_set("a", IndexState::Creating, IndexState::Created), Ok(true));
    assert_eq!(catalog.state("a"), Some(IndexState::Created));
    assert_eq!(catalog.compare_and_set("a", IndexState::Creating, IndexState::Broken), Ok(false));
    assert_eq!(catalog.compare_and_set("missing", IndexState::Creating, IndexState::Created), Err(()));
  }

  #[test]
  fn compare_any_and_set_accepts_multiple_sources() {
    let catalog = Catalog::new();
    catalog.insert_if_absent("a", IndexState::Uploaded, meta());
    assert_eq!(
      catalog.compare_any_and_set("a", &[IndexState::Created, IndexState::Uploaded], IndexState::InBuildQueue),
      Ok(true)
    );
  }

  #[test]
  fn exactly_one_concurrent_create_wins() {
    let catalog = Arc::new(Catalog::new());
    let handles: Vec<_> = (0..32)
      .map(|_| {
        let catalog = Arc::clone(&catalog);
        thread::spawn(move || catalog.insert_if_absent("race", IndexState::Creating, meta()))
      })
      .collect();
    let successes = handles.into_iter().map(|h| h.join().unwrap()).filter(|ok| *ok).count();
    assert_eq!(successes, 1);
  }
}
