//! The request/response envelope (spec.md §4.9: newline-delimited JSON
//! framing). Mirrors the teacher's `ipc::protocol` split: one small,
//! method-agnostic frame shape that every typed params/result pair rides
//! inside.

use crate::Method;
use crate::error::RpcError;
use serde::{Deserialize, Serialize};
use vectoriadb_core::BuildProgress;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request<P = serde_json::Value> {
  pub id: u64,
  pub method: Method,
  #[serde(default)]
  pub params: P,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response<R = serde_json::Value> {
  pub id: u64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub result: Option<R>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<RpcError>,
  /// Present only on `buildStatus`'s streamed frames; absent on every
  /// other method's single response.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub progress: Option<BuildProgress>,
}

impl<R> Response<R> {
  pub fn success(id: u64, result: R) -> Self {
    Self {
      id,
      result: Some(result),
      error: None,
      progress: None,
    }
  }

  pub fn failure(id: u64, error: RpcError) -> Self {
    Self {
      id,
      result: None,
      error: Some(error),
      progress: None,
    }
  }
}

impl Response<()> {
  pub fn progress_update(id: u64, progress: BuildProgress) -> Self {
    Self {
      id,
      result: None,
      error: None,
      progress: Some(progress),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::request::CreateIndexParams;
  use vectoriadb_core::Distance;

  #[test]
  fn request_round_trips_through_json() {
    let request = Request {
      id: 7,
      method: Method::CreateIndex,
      params: CreateIndexParams {
        name: "a".to_string(),
        distance: Distance::L2,
      },
    };
    let json = serde_json::to_string(&request).unwrap();
    let parsed: Request<CreateIndexParams> = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.id, 7);
    assert_eq!(parsed.params.name, "a");
  }

  #[test]
  fn success_response_omits_error_and_progress() {
    let response = Response::success(1, crate::response::ListIndexesResult { names: vec!["a".to_string()] });
    let json = serde_json::to_value(&response).unwrap();
    assert!(json.get("error").is_none());
    assert!(json.get("progress").is_none());
  }
}
