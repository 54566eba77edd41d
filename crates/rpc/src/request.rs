//! Typed params for each method (spec.md §6 RPC surface).

use serde::{Deserialize, Serialize};
use vectoriadb_core::Distance;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIndexParams {
  pub name: String,
  pub distance: Distance,
}

// `Request<P>`'s `params` field carries `#[serde(default)]` so a caller can
// omit empty params objects; that requires `P: Default` for every params
// type the envelope is instantiated with, even ones where the default
// value is never meaningfully used.
impl Default for CreateIndexParams {
  fn default() -> Self {
    Self {
      name: String::new(),
      distance: Distance::L2,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TriggerIndexBuildParams {
  pub name: String,
}

/// One frame of the `uploadVectors` stream. Each `Request<UploadChunkParams>`
/// line after the first carries the same `index_name`; the vector and id
/// are ignored once `complete` is set, which is the client's signal that
/// the stream is done and the session should be finalized.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UploadChunkParams {
  pub index_name: String,
  #[serde(default)]
  pub vector: Vec<f32>,
  #[serde(default)]
  pub id: Vec<u8>,
  #[serde(default)]
  pub complete: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BuildStatusParams {}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RetrieveIndexStateParams {
  pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListIndexesParams {}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SwitchToBuildModeParams {}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SwitchToSearchModeParams {}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FindNearestNeighboursParams {
  pub index_name: String,
  pub k: usize,
  pub vector: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DropIndexParams {
  pub name: String,
}
