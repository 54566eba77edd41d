//! Dispatch for the non-streaming RPC methods: parse typed params out of a
//! generic JSON request, call the matching `IndexManager` method, and fold
//! the result back into a generic JSON response. `uploadVectors` and
//! `buildStatus` are streaming and handled directly by the connection loop
//! in [`crate::transport`] instead of going through here.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use vectoriadb_core::Status;
use vectoriadb_manager::IndexManager;
use vectoriadb_rpc::{
  CreateIndexParams, CreateIndexResult, DropIndexParams, DropIndexResult, FindNearestNeighboursParams,
  FindNearestNeighboursResult, ListIndexesParams, ListIndexesResult, Method, Request, RetrieveIndexStateParams,
  RetrieveIndexStateResult, Response, RpcError, SwitchToBuildModeParams, SwitchToBuildModeResult, SwitchToSearchModeParams,
  SwitchToSearchModeResult, TriggerIndexBuildParams, TriggerIndexBuildResult,
};

/// Route one request to its handler and serialize the result back to JSON.
/// Called only for methods whose whole exchange is a single request and a
/// single response.
pub async fn handle(manager: &Arc<IndexManager>, request: Request<serde_json::Value>) -> Response<serde_json::Value> {
  let id = request.id;
  match request.method {
    Method::CreateIndex => {
      run(id, request.params, |p: CreateIndexParams| async move {
        manager.create_index(&p.name, p.distance).await.map(|()| CreateIndexResult {})
      })
      .await
    }
    Method::TriggerIndexBuild => {
      run(id, request.params, |p: TriggerIndexBuildParams| async move {
        manager.trigger_index_build(&p.name).await.map(|()| TriggerIndexBuildResult {})
      })
      .await
    }
    Method::RetrieveIndexState => {
      run(id, request.params, |p: RetrieveIndexStateParams| async move {
        manager.retrieve_index_state(&p.name).await.map(|state| RetrieveIndexStateResult { state })
      })
      .await
    }
    Method::ListIndexes => {
      run(id, request.params, |_: ListIndexesParams| async move {
        manager.list_indexes().await.map(|names| ListIndexesResult { names })
      })
      .await
    }
    Method::SwitchToBuildMode => {
      run(id, request.params, |_: SwitchToBuildModeParams| async move {
        manager.switch_to_build_mode().await.map(|()| SwitchToBuildModeResult {})
      })
      .await
    }
    Method::SwitchToSearchMode => {
      run(id, request.params, |_: SwitchToSearchModeParams| async move {
        manager.switch_to_search_mode().await.map(|()| SwitchToSearchModeResult {})
      })
      .await
    }
    Method::FindNearestNeighbours => {
      run(id, request.params, |p: FindNearestNeighboursParams| async move {
        manager
          .find_nearest_neighbours(&p.index_name, p.k, &p.vector)
          .await
          .map(|ids| FindNearestNeighboursResult { ids })
      })
      .await
    }
    Method::DropIndex => {
      run(id, request.params, |p: DropIndexParams| async move {
        manager.drop_index(&p.name).await.map(|()| DropIndexResult {})
      })
      .await
    }
    Method::UploadVectors | Method::BuildStatus => {
      Response::failure(id, RpcError::from(Status::internal("stream method routed through the non-streaming dispatcher")))
    }
  }
}

async fn run<P, R, F, Fut>(id: u64, raw_params: serde_json::Value, handler: F) -> Response<serde_json::Value>
where
  P: DeserializeOwned,
  R: Serialize,
  F: FnOnce(P) -> Fut,
  Fut: std::future::Future<Output = Result<R, Status>>,
{
  let params: P = match serde_json::from_value(raw_params) {
    Ok(params) => params,
    Err(err) => return Response::failure(id, RpcError::from(Status::invalid_argument(format!("bad params: {err}")))),
  };

  match handler(params).await {
    Ok(result) => match serde_json::to_value(result) {
      Ok(value) => Response::success(id, value),
      Err(err) => Response::failure(id, RpcError::from(Status::internal(format!("failed to encode result: {err}")))),
    },
    Err(status) => Response::failure(id, RpcError::from(status)),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;
  use vectoriadb_core::{Code, Config, Distance, IndexConfig, ServerConfig};

  async fn manager(dir: &TempDir) -> Arc<IndexManager> {
    let config = Config {
      index: IndexConfig {
        dimensions: 3,
        max_connections_per_vertex: 16,
        max_candidates_returned: 64,
        compression_ratio: 8,
        distance_multiplier: 1.0,
        building_max_memory_consumption: Some(vectoriadb_core::MemorySize(1 << 20)),
        search_disk_cache_memory_consumption: Some(vectoriadb_core::MemorySize(1 << 20)),
      },
      server: ServerConfig {
        base_path: dir.path().to_path_buf(),
        ..ServerConfig::default()
      },
    };
    IndexManager::new(config).await.unwrap()
  }

  #[tokio::test]
  async fn create_index_round_trips_through_the_router() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir).await;

    let request = Request {
      id: 1,
      method: Method::CreateIndex,
      params: serde_json::json!({"name": "a", "distance": "L2"}),
    };
    let response = handle(&manager, request).await;
    assert!(response.error.is_none());
    assert!(response.result.is_some());
  }

  #[tokio::test]
  async fn unknown_params_shape_is_invalid_argument() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir).await;

    let request = Request {
      id: 2,
      method: Method::CreateIndex,
      params: serde_json::json!({"distance": "L2"}),
    };
    let response = handle(&manager, request).await;
    let error = response.error.unwrap();
    assert_eq!(error.code, Code::InvalidArgument.as_str());
  }

  #[tokio::test]
  async fn not_found_status_maps_to_an_rpc_error() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir).await;

    let request = Request {
      id: 3,
      method: Method::RetrieveIndexState,
      params: serde_json::json!({"name": "missing"}),
    };
    let response = handle(&manager, request).await;
    let error = response.error.unwrap();
    assert_eq!(error.code, Code::NotFound.as_str());
  }
}
