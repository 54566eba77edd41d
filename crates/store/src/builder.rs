//! `IndexBuilder`: the blocking batch job that turns a `DataStore`'s raw
//! vectors into a queryable on-disk index (spec.md §1 — treated as an
//! opaque collaborator by the Index Manager; this is the implementation it
//! calls through a narrow interface).

use crate::datastore::DataStore;
use crate::format::{Header, RecordReader, write_record};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;
use vectoriadb_core::progress::BuildPhase;

pub const INDEX_FILE: &str = "index.bin";

#[derive(Error, Debug)]
pub enum BuildError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
}

/// The sizing parameters spec.md §6 passes through from configuration.
#[derive(Debug, Clone, Copy)]
pub struct BuildParams {
  pub dims: usize,
  pub max_connections_per_vertex: u32,
  pub max_candidates_returned: u32,
  pub compression_ratio: u32,
  pub distance_multiplier: f32,
  pub max_memory_consumption: u64,
}

/// Build the on-disk index for `index_dir` from its raw data file,
/// reporting progress through `on_progress` as phases complete.
///
/// The graph-construction parameters (`max_connections_per_vertex` etc.)
/// are recorded into the `finalize` phase's parameters rather than used to
/// build an actual navigable graph: the spec treats ANN construction as an
/// out-of-scope algorithm, so this performs an exact compaction of the raw
/// stream into the reader's record format and leaves those parameters as
/// pass-through metadata a real ANN builder would consume.
pub fn build(index_dir: &Path, params: BuildParams, mut on_progress: impl FnMut(BuildPhase)) -> Result<(), BuildError> {
  on_progress(BuildPhase {
    name: "scan".to_string(),
    completion_percentage: 0,
    parameters: vec![format!("dims={}", params.dims)],
  });

  let raw_path = DataStore::raw_data_path(index_dir);
  let raw_bytes = std::fs::read(&raw_path)?;

  let mut records = Vec::new();
  {
    let mut reader = RecordReader::new(&raw_bytes, params.dims);
    while let Some(record) = reader.next() {
      records.push((record.id.to_vec(), record.vector.to_vec()));
    }
  }
  on_progress(BuildPhase {
    name: "scan".to_string(),
    completion_percentage: 100,
    parameters: vec![format!("records={}", records.len())],
  });

  on_progress(BuildPhase {
    name: "compact".to_string(),
    completion_percentage: 0,
    parameters: vec![],
  });

  let index_path = index_dir.join(INDEX_FILE);
  let file = File::create(&index_path)?;
  let mut writer = BufWriter::new(file);

  let header = Header {
    dims: params.dims as u32,
    count: records.len() as u64,
  };
  header.write(&mut writer)?;

  let total = records.len().max(1);
  for (i, (id, vector)) in records.iter().enumerate() {
    write_record(&mut writer, id, vector)?;
    if i % 4096 == 0 || i + 1 == records.len() {
      on_progress(BuildPhase {
        name: "compact".to_string(),
        completion_percentage: (((i + 1) * 100) / total) as u8,
        parameters: vec![],
      });
    }
  }
  writer.flush()?;
  writer.get_ref().sync_all()?;

  on_progress(BuildPhase {
    name: "finalize".to_string(),
    completion_percentage: 100,
    parameters: vec![
      format!("max-connections-per-vertex={}", params.max_connections_per_vertex),
      format!("max-candidates-returned={}", params.max_candidates_returned),
      format!("compression-ratio={}", params.compression_ratio),
      format!("distance-multiplier={}", params.distance_multiplier),
    ],
  });

  Ok(())
}

pub fn index_file_path(index_dir: &Path) -> std::path::PathBuf {
  index_dir.join(INDEX_FILE)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::datastore::DataStore;
  use tempfile::TempDir;

  fn params() -> BuildParams {
    BuildParams {
      dims: 3,
      max_connections_per_vertex: 16,
      max_candidates_returned: 64,
      compression_ratio: 8,
      distance_multiplier: 1.0,
      max_memory_consumption: 1024 * 1024,
    }
  }

  #[test]
  fn builds_a_readable_index_file() {
    let dir = TempDir::new().unwrap();
    let mut store = DataStore::create(dir.path(), 3).unwrap();
    store.append(&[1.0, 2.0, 3.0], b"a").unwrap();
    store.append(&[4.0, 5.0, 6.0], b"b").unwrap();
    store.close().unwrap();

    let mut phases = Vec::new();
    build(dir.path(), params(), |p| phases.push(p)).unwrap();

    assert!(phases.iter().any(|p| p.name == "scan" && p.completion_percentage == 100));
    assert!(phases.iter().any(|p| p.name == "finalize" && p.completion_percentage == 100));

    let bytes = std::fs::read(index_file_path(dir.path())).unwrap();
    let header = Header::read(&mut &bytes[..]).unwrap();
    assert_eq!(header.dims, 3);
    assert_eq!(header.count, 2);
  }
}
