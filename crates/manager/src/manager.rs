//! `IndexManager`: the facade wiring the catalog, operation gate, mode
//! controller, progress tracker, and startup reconciler into the single
//! control plane spec.md describes (spec.md §1, §2).

use crate::catalog::Catalog;
use crate::gate::OperationGate;
use crate::mode::{ActiveMode, BuildMode, ModeController, SearchMode};
use crate::progress::ProgressTracker;
use crate::reconcile;
use crate::status;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use vectoriadb_core::{Config, DefaultMode, IndexState, MemoryBudget, MemoryProbeError, Status};
use vectoriadb_store::BuildParams;

pub const INDEXES_DIR: &str = "indexes";
pub const LOGS_DIR: &str = "logs";
pub const CONFIG_DIR: &str = "config";

/// The process-wide concurrent-upload ceiling (spec.md §3).
pub const UPLOAD_BUDGET: usize = 64;

#[derive(Error, Debug)]
pub enum ManagerError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error(transparent)]
  Memory(#[from] MemoryProbeError),
}

pub struct IndexManager {
  pub(crate) catalog: Arc<Catalog>,
  pub(crate) gate: Arc<OperationGate>,
  pub(crate) mode: Arc<ModeController>,
  pub(crate) progress: Arc<ProgressTracker>,
  pub(crate) config: Config,
  pub(crate) memory: MemoryBudget,
  pub(crate) indexes_dir: PathBuf,
  pub(crate) creation_lock: AsyncMutex<()>,
  pub(crate) uploader_lock: AsyncMutex<HashSet<String>>,
  pub(crate) build_tx: mpsc::Sender<String>,
}

impl IndexManager {
  /// Ensure the on-disk layout, run the host-memory probe and startup
  /// reconciler, and construct a manager in its configured default mode.
  pub async fn new(config: Config) -> Result<Arc<Self>, ManagerError> {
    let base_path = config.server.base_path.clone();
    let indexes_dir = base_path.join(INDEXES_DIR);
    std::fs::create_dir_all(&indexes_dir)?;
    std::fs::create_dir_all(base_path.join(LOGS_DIR))?;
    std::fs::create_dir_all(base_path.join(CONFIG_DIR))?;

    let memory = MemoryBudget::discover(&config)?;

    let catalog = Arc::new(Catalog::new());
    reconcile::reconcile(&catalog, &indexes_dir)?;

    let gate = Arc::new(OperationGate::new());
    let progress = ProgressTracker::spawn();

    let initial = match config.server.default_mode {
      DefaultMode::Build => ActiveMode::Build(BuildMode),
      DefaultMode::Search => ActiveMode::Search(SearchMode::new(memory.disk_cache_memory_consumption)),
    };
    let mode = Arc::new(ModeController::new(Arc::clone(&gate), initial));

    let (build_tx, build_rx) = mpsc::channel(1);

    let manager = Arc::new(Self {
      catalog,
      gate,
      mode,
      progress,
      config,
      memory,
      indexes_dir,
      creation_lock: AsyncMutex::new(()),
      uploader_lock: AsyncMutex::new(HashSet::new()),
      build_tx,
    });

    crate::build_mode::spawn_build_worker(Arc::clone(&manager), build_rx);

    Ok(manager)
  }

  pub fn index_dir(&self, name: &str) -> PathBuf {
    self.indexes_dir.join(name)
  }

  pub(crate) fn build_params(&self) -> BuildParams {
    BuildParams {
      dims: self.config.index.dimensions,
      max_connections_per_vertex: self.config.index.max_connections_per_vertex,
      max_candidates_returned: self.config.index.max_candidates_returned,
      compression_ratio: self.config.index.compression_ratio,
      distance_multiplier: self.config.index.distance_multiplier,
      max_memory_consumption: self.memory.index_building_max_memory_consumption,
    }
  }

  pub async fn retrieve_index_state(&self, name: &str) -> Result<IndexState, Status> {
    let _permit = self.gate.acquire_operation()?;
    self.catalog.state(name).ok_or_else(|| Status::not_found(format!("no such index: {name}")))
  }

  /// Excludes BROKEN (spec.md §6).
  pub async fn list_indexes(&self) -> Result<Vec<String>, Status> {
    let _permit = self.gate.acquire_operation()?;
    Ok(
      self
        .catalog
        .list()
        .into_iter()
        .filter(|(_, state)| *state != IndexState::Broken)
        .map(|(name, _)| name)
        .collect(),
    )
  }

  pub async fn switch_to_build_mode(&self) -> Result<(), Status> {
    self.mode.switch_to_build().await
  }

  pub async fn switch_to_search_mode(&self) -> Result<(), Status> {
    self.mode.switch_to_search(self.memory.disk_cache_memory_consumption).await
  }

  /// Drains in-flight operations (retrying every 5 s) and marks the gate
  /// permanently closed; every operation after this returns fails
  /// UNAVAILABLE (spec.md §4.1, §8).
  pub async fn shutdown(&self) {
    self.mode.shutdown().await;
  }

  /// `dropIndex`: behavior depends on which mode is active (spec.md §4.3,
  /// §4.4). The permit is acquired once here and held across the
  /// mode-specific helper so a mode swap cannot interleave with it.
  pub async fn drop_index(&self, name: &str) -> Result<(), Status> {
    let _permit = self.gate.acquire_operation()?;
    if self.mode.is_search().await {
      self.drop_index_search_mode(name).await
    } else {
      self.drop_index_build_mode(name).await
    }
  }
}

pub(crate) fn broken_status_best_effort(dir: &std::path::Path) {
  if let Err(err) = status::write_status(dir, IndexState::Broken) {
    tracing::error!(path = %dir.display(), error = %err, "failed to persist BROKEN status");
  }
}
