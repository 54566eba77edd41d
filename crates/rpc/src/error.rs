//! `RpcError`: the wire shape an RPC response's `error` field carries
//! (spec.md §6 "Error codes"). A thin, serializable mirror of
//! `vectoriadb_core::Status` — the code travels as its string form so a
//! client on the other side of the wire doesn't need this crate's enum to
//! read it back.

use serde::{Deserialize, Serialize};
use vectoriadb_core::Status;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
  pub code: String,
  pub message: String,
}

impl From<Status> for RpcError {
  fn from(status: Status) -> Self {
    Self {
      code: status.code.as_str().to_string(),
      message: status.message,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use vectoriadb_core::Code;

  #[test]
  fn carries_the_code_as_its_wire_string() {
    let error: RpcError = Status::not_found("no such index: a").into();
    assert_eq!(error.code, Code::NotFound.as_str());
    assert_eq!(error.message, "no such index: a");
  }
}
