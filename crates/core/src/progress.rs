//! Shared build-progress wire shapes (spec.md §4.7), used by the builder
//! that produces progress updates and the manager's tracker that
//! broadcasts them to subscribed listeners.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildPhase {
  pub name: String,
  pub completion_percentage: u8,
  pub parameters: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildProgress {
  pub index_name: String,
  pub phases: Vec<BuildPhase>,
}
