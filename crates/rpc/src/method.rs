//! The RPC method vocabulary (spec.md §6).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
  CreateIndex,
  TriggerIndexBuild,
  UploadVectors,
  BuildStatus,
  RetrieveIndexState,
  ListIndexes,
  SwitchToBuildMode,
  SwitchToSearchMode,
  FindNearestNeighbours,
  DropIndex,
}

impl Method {
  pub fn as_str(&self) -> &'static str {
    match self {
      Method::CreateIndex => "create_index",
      Method::TriggerIndexBuild => "trigger_index_build",
      Method::UploadVectors => "upload_vectors",
      Method::BuildStatus => "build_status",
      Method::RetrieveIndexState => "retrieve_index_state",
      Method::ListIndexes => "list_indexes",
      Method::SwitchToBuildMode => "switch_to_build_mode",
      Method::SwitchToSearchMode => "switch_to_search_mode",
      Method::FindNearestNeighbours => "find_nearest_neighbours",
      Method::DropIndex => "drop_index",
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn round_trips_through_json() {
    for method in [
      Method::CreateIndex,
      Method::TriggerIndexBuild,
      Method::UploadVectors,
      Method::BuildStatus,
      Method::RetrieveIndexState,
      Method::ListIndexes,
      Method::SwitchToBuildMode,
      Method::SwitchToSearchMode,
      Method::FindNearestNeighbours,
      Method::DropIndex,
    ] {
      let json = serde_json::to_string(&method).unwrap();
      let parsed: Method = serde_json::from_str(&json).unwrap();
      assert_eq!(parsed, method);
    }
  }
}
