//! `IndexState`, the finite enumeration driving the index lifecycle
//! (spec.md §3).

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexState {
  Creating,
  Created,
  Uploading,
  Uploaded,
  InBuildQueue,
  Building,
  Built,
  Broken,
}

impl IndexState {
  /// States that are not safe to resume across an unclean restart
  /// (spec.md §4.5). Indexes parked in one of these are skipped by the
  /// startup reconciler and never re-enter the catalog.
  pub fn resumable_on_restart(self) -> bool {
    !matches!(
      self,
      IndexState::Creating | IndexState::Uploading | IndexState::Building | IndexState::InBuildQueue | IndexState::Broken
    )
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      IndexState::Creating => "CREATING",
      IndexState::Created => "CREATED",
      IndexState::Uploading => "UPLOADING",
      IndexState::Uploaded => "UPLOADED",
      IndexState::InBuildQueue => "IN_BUILD_QUEUE",
      IndexState::Building => "BUILDING",
      IndexState::Built => "BUILT",
      IndexState::Broken => "BROKEN",
    }
  }
}

impl fmt::Display for IndexState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unrecognized index state: {0}")]
pub struct ParseStateError(pub String);

impl std::str::FromStr for IndexState {
  type Err = ParseStateError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "CREATING" => Ok(IndexState::Creating),
      "CREATED" => Ok(IndexState::Created),
      "UPLOADING" => Ok(IndexState::Uploading),
      "UPLOADED" => Ok(IndexState::Uploaded),
      "IN_BUILD_QUEUE" => Ok(IndexState::InBuildQueue),
      "BUILDING" => Ok(IndexState::Building),
      "BUILT" => Ok(IndexState::Built),
      "BROKEN" => Ok(IndexState::Broken),
      other => Err(ParseStateError(other.to_string())),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn round_trips_through_display_and_parse() {
    for state in [
      IndexState::Creating,
      IndexState::Created,
      IndexState::Uploading,
      IndexState::Uploaded,
      IndexState::InBuildQueue,
      IndexState::Building,
      IndexState::Built,
      IndexState::Broken,
    ] {
      let parsed: IndexState = state.to_string().parse().unwrap();
      assert_eq!(parsed, state);
    }
  }

  #[test]
  fn rejects_garbage() {
    assert!("NOT_A_STATE".parse::<IndexState>().is_err());
  }

  #[test]
  fn only_terminal_states_resume_across_restart() {
    assert!(IndexState::Created.resumable_on_restart());
    assert!(IndexState::Uploaded.resumable_on_restart());
    assert!(IndexState::Built.resumable_on_restart());
    assert!(!IndexState::Creating.resumable_on_restart());
    assert!(!IndexState::Uploading.resumable_on_restart());
    assert!(!IndexState::Building.resumable_on_restart());
    assert!(!IndexState::InBuildQueue.resumable_on_restart());
    assert!(!IndexState::Broken.resumable_on_restart());
  }
}
