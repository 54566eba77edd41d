//! Typed results for each method (spec.md §6 RPC surface).

use serde::{Deserialize, Serialize};
use vectoriadb_core::IndexState;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CreateIndexResult {}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TriggerIndexBuildResult {}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UploadVectorsResult {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveIndexStateResult {
  pub state: IndexState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListIndexesResult {
  pub names: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SwitchToBuildModeResult {}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SwitchToSearchModeResult {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindNearestNeighboursResult {
  pub ids: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DropIndexResult {}
