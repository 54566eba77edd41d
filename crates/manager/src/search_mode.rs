//! Search-mode operations (spec.md §4.4): `findNearestNeighbours` and the
//! search-mode variant of `dropIndex`.

use crate::manager::IndexManager;
use std::sync::Arc;
use vectoriadb_core::{IndexState, Status};
use vectoriadb_store::IndexReader;

impl IndexManager {
  /// `findNearestNeighbours(name, k, query)`. Lazily opens and caches an
  /// `IndexReader` per index name the first time it is queried in a given
  /// Search-mode lifetime.
  pub async fn find_nearest_neighbours(&self, name: &str, k: usize, query: &[f32]) -> Result<Vec<Vec<u8>>, Status> {
    let _permit = self.gate.acquire_operation()?;
    let active = self.mode.read().await;
    let search = match active.as_search() {
      Some(search) => search,
      None => return Err(Status::permission_denied("index manager is in build mode")),
    };

    let state = self.catalog.state(name);
    if state != Some(IndexState::Built) {
      return if state.is_none() {
        Err(Status::not_found(format!("no such index: {name}")))
      } else {
        Err(Status::failed_precondition(format!("index {name} is not BUILT")))
      };
    }

    let reader = {
      let mut readers = search.readers.lock().await;
      if let Some(reader) = readers.get(name) {
        Arc::clone(reader)
      } else {
        let metadata = self
          .catalog
          .metadata(name)
          .ok_or_else(|| Status::not_found(format!("no such index: {name}")))?;
        let reader = Arc::new(
          IndexReader::open(&metadata.directory, metadata.distance, Arc::clone(&search.cache))
            .map_err(|err| Status::internal(format!("failed to open index reader: {err}")))?,
        );
        readers.insert(name.to_string(), Arc::clone(&reader));
        reader
      }
    };

    reader.query(query, k).map_err(|err| match err {
      vectoriadb_store::ReaderError::DimensionMismatch { expected, actual } => {
        Status::invalid_argument(format!("query has {actual} components, expected {expected}"))
      }
      other => Status::internal(other.to_string()),
    })
  }

  /// `dropIndex` in Search mode (spec.md §4.4): close and evict the cached
  /// reader if one exists, delete the index file, then forget the catalog
  /// entry. The caller already holds the operation permit.
  pub(crate) async fn drop_index_search_mode(&self, name: &str) -> Result<(), Status> {
    let state = self.catalog.state(name);
    match state {
      None => return Err(Status::not_found(format!("no such index: {name}"))),
      Some(IndexState::Built) => {}
      Some(_) => return Err(Status::failed_precondition(format!("index {name} is not BUILT"))),
    }

    let active = self.mode.read().await;
    let search = active.as_search().expect("drop_index_search_mode only runs while in search mode");

    let reader = search.readers.lock().await.remove(name);
    match reader {
      Some(reader) => {
        reader
          .delete_index()
          .map_err(|err| Status::internal(format!("failed to delete index file: {err}")))?;
      }
      None => {
        if let Some(metadata) = self.catalog.metadata(name) {
          let path = vectoriadb_store::index_file_path(&metadata.directory);
          if path.exists() {
            std::fs::remove_file(&path).map_err(|err| Status::internal(format!("failed to delete index file: {err}")))?;
          }
        }
      }
    }

    self.catalog.remove(name);
    Ok(())
  }
}
