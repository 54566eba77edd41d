//! The startup reconciler: scans the on-disk index tree and repopulates
//! the catalog (spec.md §4.5). "This is the only path that admits
//! historical on-disk state."

use crate::catalog::{Catalog, IndexMetadata};
use crate::status;
use std::path::Path;
use tracing::warn;

/// Scan `indexes_dir`'s subdirectories and insert every resumable index
/// into `catalog`. Indexes in a non-terminal state, or with unreadable
/// status/metadata, are skipped and left on disk untouched (spec.md §7:
/// "restart never resumes a non-terminal state; such indexes remain on
/// disk but are not loaded").
pub fn reconcile(catalog: &Catalog, indexes_dir: &Path) -> std::io::Result<()> {
  if !indexes_dir.exists() {
    return Ok(());
  }

  for entry in std::fs::read_dir(indexes_dir)? {
    let entry = entry?;
    if !entry.file_type()?.is_dir() {
      continue;
    }
    let name = entry.file_name().to_string_lossy().into_owned();
    let dir = entry.path();

    let state = match status::read_status(&dir) {
      Ok(state) => state,
      Err(err) => {
        warn!(index = %name, error = %err, "skipping index with unreadable or unparseable status file");
        continue;
      }
    };

    if !state.resumable_on_restart() {
      warn!(index = %name, %state, "skipping non-terminal index left over from an unclean restart");
      continue;
    }

    let distance = match status::read_metadata(&dir) {
      Ok(distance) => distance,
      Err(err) => {
        warn!(index = %name, error = %err, "skipping index with unreadable or unparseable metadata file");
        continue;
      }
    };

    catalog.insert_recovered(&name, state, IndexMetadata { distance, directory: dir });
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;
  use vectoriadb_core::{Distance, IndexState};

  fn make_index(indexes_dir: &Path, name: &str, state: IndexState, distance: Distance) {
    let dir = indexes_dir.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    status::write_status(&dir, state).unwrap();
    status::write_metadata(&dir, distance).unwrap();
  }

  #[test]
  fn recovers_terminal_states_and_skips_non_terminal_ones() {
    let root = TempDir::new().unwrap();
    let indexes_dir = root.path().join("indexes");
    std::fs::create_dir_all(&indexes_dir).unwrap();

    make_index(&indexes_dir, "built", IndexState::Built, Distance::L2);
    make_index(&indexes_dir, "created", IndexState::Created, Distance::Cosine);
    make_index(&indexes_dir, "building", IndexState::Building, Distance::L2);
    make_index(&indexes_dir, "broken", IndexState::Broken, Distance::L2);

    let catalog = Catalog::new();
    reconcile(&catalog, &indexes_dir).unwrap();

    assert_eq!(catalog.state("built"), Some(IndexState::Built));
    assert_eq!(catalog.state("created"), Some(IndexState::Created));
    assert_eq!(catalog.state("building"), None);
    assert_eq!(catalog.state("broken"), None);
  }

  #[test]
  fn missing_indexes_dir_is_not_an_error() {
    let root = TempDir::new().unwrap();
    let catalog = Catalog::new();
    reconcile(&catalog, &root.path().join("indexes")).unwrap();
    assert!(catalog.list().is_empty());
  }
}
