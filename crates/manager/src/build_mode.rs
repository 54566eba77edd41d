//! Build-mode operations (spec.md §4.3): index creation, streaming upload
//! sessions, build scheduling, the build worker, and the build-mode variant
//! of `dropIndex`.

use crate::catalog::IndexMetadata;
use crate::manager::{IndexManager, UPLOAD_BUDGET, broken_status_best_effort};
use crate::status;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, mpsc};
use vectoriadb_core::{BuildPhase, BuildProgress, Distance, IndexState, Status};
use vectoriadb_store::DataStore;

impl IndexManager {
  /// `createIndex(name, distance)`, serialized by `creation_lock`
  /// (spec.md §4.3).
  pub async fn create_index(self: &Arc<Self>, name: &str, distance: Distance) -> Result<(), Status> {
    let _permit = self.gate.acquire_operation()?;
    if !self.mode.is_build().await {
      return Err(Status::permission_denied("index manager is in search mode"));
    }
    let _creation_lock = self.creation_lock.lock().await;

    let dir = self.index_dir(name);
    let metadata = IndexMetadata {
      distance,
      directory: dir.clone(),
    };
    if !self.catalog.insert_if_absent(name, IndexState::Creating, metadata) {
      return Err(Status::already_exists(format!("index already exists: {name}")));
    }

    if let Err(err) = self.create_index_inner(name, &dir, distance).await {
      return Err(err);
    }
    Ok(())
  }

  async fn create_index_inner(&self, name: &str, dir: &PathBuf, distance: Distance) -> Result<(), Status> {
    // Step 2: create the index directory.
    if let Err(err) = std::fs::create_dir_all(dir) {
      self.catalog.remove(name);
      return Err(Status::internal(format!("failed to create index directory: {err}")));
    }

    // Step 3: durably write status = CREATING.
    if let Err(err) = status::write_status(dir, IndexState::Creating) {
      self.catalog.remove(name);
      return Err(Status::internal(format!("failed to persist CREATING status: {err}")));
    }

    // Step 4: metadata was already recorded in the catalog entry at
    // insertion time (distance + directory are both known up front).

    // Step 5: CAS CREATING -> CREATED.
    match self.catalog.compare_and_set(name, IndexState::Creating, IndexState::Created) {
      Ok(true) => {}
      _ => {
        self.catalog.force_set(name, IndexState::Broken);
        broken_status_best_effort(dir);
        return Err(Status::internal("index creation lost its state-transition race"));
      }
    }

    // Step 6: write the metadata file (write + sync + create-new).
    if let Err(err) = status::write_metadata(dir, distance) {
      self.catalog.remove(name);
      return Err(Status::internal(format!("failed to persist index metadata: {err}")));
    }

    // Step 7: durably write status = CREATED.
    if let Err(err) = status::write_status(dir, IndexState::Created) {
      self.catalog.remove(name);
      return Err(Status::internal(format!("failed to persist CREATED status: {err}")));
    }

    Ok(())
  }

  /// `triggerIndexBuild(name)`: atomically transitions
  /// `CREATED|UPLOADED -> IN_BUILD_QUEUE` and enqueues the build.
  pub async fn trigger_index_build(&self, name: &str) -> Result<(), Status> {
    let _permit = self.gate.acquire_operation()?;
    if !self.mode.is_build().await {
      return Err(Status::permission_denied("index manager is in search mode"));
    }

    match self.catalog.compare_any_and_set(name, &[IndexState::Created, IndexState::Uploaded], IndexState::InBuildQueue) {
      Ok(true) => {}
      Ok(false) => return Err(Status::failed_precondition(format!("index {name} is not ready to build"))),
      Err(()) => return Err(Status::not_found(format!("no such index: {name}"))),
    }

    let dir = self.index_dir(name);
    if let Err(err) = status::write_status(&dir, IndexState::InBuildQueue) {
      self.catalog.force_set(name, IndexState::Broken);
      broken_status_best_effort(&dir);
      return Err(Status::internal(format!("failed to persist IN_BUILD_QUEUE status: {err}")));
    }

    self
      .build_tx
      .send(name.to_string())
      .await
      .map_err(|_| Status::internal("build worker is not running"))?;
    Ok(())
  }

  /// `buildStatus({})`: registers a progress listener with the global
  /// tracker.
  pub async fn build_status(&self) -> Result<mpsc::Receiver<BuildProgress>, Status> {
    let _permit = self.gate.acquire_operation()?;
    if !self.mode.is_build().await {
      return Err(Status::permission_denied("index manager is in search mode"));
    }
    Ok(self.progress.subscribe())
  }

  /// `dropIndex` in Build mode: CAS `{CREATED, BUILT, UPLOADED} -> BROKEN`
  /// under `creation_lock`, then remove the directory. A `BROKEN` index is
  /// not in the CAS's source set and so cannot be dropped here — spec.md
  /// §9 flags this as likely unintended but preserves it.
  pub(crate) async fn drop_index_build_mode(&self, name: &str) -> Result<(), Status> {
    let _creation_lock = self.creation_lock.lock().await;

    match self
      .catalog
      .compare_any_and_set(name, &[IndexState::Created, IndexState::Built, IndexState::Uploaded], IndexState::Broken)
    {
      Ok(true) => {}
      Ok(false) => return Err(Status::failed_precondition(format!("index {name} cannot be dropped in its current state"))),
      Err(()) => return Err(Status::not_found(format!("no such index: {name}"))),
    }

    let dir = self.index_dir(name);
    broken_status_best_effort(&dir);

    if let Err(err) = std::fs::remove_dir_all(&dir) {
      tracing::error!(index = %name, error = %err, "failed to remove index directory; leaving index BROKEN");
      return Err(Status::internal(format!("failed to remove index directory: {err}")));
    }

    self.catalog.remove(name);
    Ok(())
  }
}

/// Per-stream upload session state (spec.md §4.3, §9 "Streaming upload").
/// Holds the one operation permit for the stream's whole lifetime and
/// releases it exactly once, on drop, regardless of which terminal method
/// is called or whether the caller drops the session on an unhandled
/// error path.
pub struct UploadSession {
  manager: Arc<IndexManager>,
  name: Option<String>,
  store: Option<DataStore>,
  _permit: OwnedSemaphorePermit,
}

impl IndexManager {
  /// Begin a streaming upload session. Mirrors spec.md §4.3's
  /// `uploadVectors` protocol: the permit is acquired once here and the
  /// first chunk establishes which index the session belongs to.
  pub async fn start_upload_session(self: &Arc<Self>) -> Result<UploadSession, Status> {
    let permit = self.gate.acquire_operation()?;
    if !self.mode.is_build().await {
      return Err(Status::permission_denied("index manager is in search mode"));
    }
    Ok(UploadSession {
      manager: Arc::clone(self),
      name: None,
      store: None,
      _permit: permit,
    })
  }
}

impl UploadSession {
  /// Feed one chunk. The first call on a session declares and locks in the
  /// index name; every later call must name the same index.
  pub async fn chunk(&mut self, index_name: &str, vector: &[f32], id: &[u8]) -> Result<(), Status> {
    match &self.name {
      None => self.first_chunk(index_name, vector, id).await,
      Some(name) if name == index_name => self.append(vector, id),
      Some(_) => {
        // spec.md §9 flags a source bug here (logs and reports but does
        // not return early); this implementation returns as the spec says
        // a correct one should.
        Err(Status::failed_precondition("chunk index name does not match the session's index"))
      }
    }
  }

  async fn first_chunk(&mut self, index_name: &str, vector: &[f32], id: &[u8]) -> Result<(), Status> {
    let manager = &self.manager;

    // Checked ahead of the CAS so a bad first chunk leaves the index at
    // CREATED rather than stranding it in UPLOADING with no data store
    // (spec.md §8 scenario 3: "state remains CREATED").
    let dims = manager.config.index.dimensions;
    if vector.len() != dims {
      return Err(Status::invalid_argument(format!("vector has {} components, expected {dims}", vector.len())));
    }

    match manager.catalog.compare_and_set(index_name, IndexState::Created, IndexState::Uploading) {
      Ok(true) => {}
      Ok(false) => return Err(Status::failed_precondition(format!("index {index_name} is not ready to accept an upload"))),
      Err(()) => return Err(Status::not_found(format!("no such index: {index_name}"))),
    }

    {
      let mut uploading = manager.uploader_lock.lock().await;
      if uploading.len() >= UPLOAD_BUDGET && !uploading.contains(index_name) {
        manager.catalog.force_set(index_name, IndexState::Created);
        return Err(Status::resource_exhausted("upload budget exhausted"));
      }
      uploading.insert(index_name.to_string());
    }

    let dir = manager.index_dir(index_name);
    let store = match DataStore::create(&dir, dims) {
      Ok(store) => store,
      Err(err) => {
        manager.uploader_lock.lock().await.remove(index_name);
        manager.catalog.force_set(index_name, IndexState::Broken);
        broken_status_best_effort(&dir);
        return Err(Status::internal(format!("failed to open data store: {err}")));
      }
    };

    self.name = Some(index_name.to_string());
    self.store = Some(store);
    self.append(vector, id)
  }

  fn append(&mut self, vector: &[f32], id: &[u8]) -> Result<(), Status> {
    let name = self.name.as_deref().expect("append called before a session name was established");
    let manager = &self.manager;
    if manager.catalog.state(name) != Some(IndexState::Uploading) {
      return Err(Status::failed_precondition(format!("index {name} is no longer accepting uploads")));
    }

    let store = self.store.as_mut().expect("append called before a session name was established");
    match store.append(vector, id) {
      Ok(()) => Ok(()),
      Err(vectoriadb_store::StoreError::DimensionMismatch { expected, actual }) => {
        Err(Status::invalid_argument(format!("vector has {actual} components, expected {expected}")))
      }
      Err(err) => Err(Status::internal(format!("failed to append vector: {err}"))),
    }
  }

  /// `onCompleted`: close the data store, transition `UPLOADING ->
  /// UPLOADED`, persist, and release the permit (via `Drop`).
  pub async fn complete(mut self) -> Result<(), Status> {
    let Some(name) = self.name.take() else {
      return Ok(());
    };
    let manager = Arc::clone(&self.manager);
    let store = self.store.take().expect("a named session always has a data store");

    if let Err(err) = store.close() {
      return Err(self.fail_inner(&manager, &name, Status::internal(format!("failed to close data store: {err}"))).await);
    }

    manager.uploader_lock.lock().await.remove(&name);

    match manager.catalog.compare_and_set(&name, IndexState::Uploading, IndexState::Uploaded) {
      Ok(true) => {}
      _ => return Err(Status::internal(format!("index {name} left UPLOADING before the stream completed"))),
    }

    let dir = manager.index_dir(&name);
    if let Err(err) = status::write_status(&dir, IndexState::Uploaded) {
      manager.catalog.force_set(&name, IndexState::Broken);
      broken_status_best_effort(&dir);
      return Err(Status::internal(format!("failed to persist UPLOADED status: {err}")));
    }

    Ok(())
  }

  /// `onError`: mark the index BROKEN, persist, remove from the uploading
  /// set, close the store best-effort, and propagate the error.
  pub async fn fail(mut self, err: Status) -> Status {
    let Some(name) = self.name.take() else { return err };
    let manager = Arc::clone(&self.manager);
    self.fail_inner(&manager, &name, err).await
  }

  async fn fail_inner(&mut self, manager: &Arc<IndexManager>, name: &str, err: Status) -> Status {
    manager.catalog.force_set(name, IndexState::Broken);
    broken_status_best_effort(&manager.index_dir(name));
    manager.uploader_lock.lock().await.remove(name);
    if let Some(store) = self.store.take() {
      let _ = store.close();
    }
    err
  }
}

pub(crate) fn spawn_build_worker(manager: Arc<IndexManager>, mut rx: mpsc::Receiver<String>) {
  tokio::spawn(async move {
    while let Some(name) = rx.recv().await {
      run_build_task(&manager, &name).await;
    }
  });
}

/// `IndexBuilderTask` (spec.md §4.3), run on the single-slot build worker.
async fn run_build_task(manager: &Arc<IndexManager>, name: &str) {
  let permit = match manager.gate.acquire_operation() {
    Ok(permit) => permit,
    Err(_) => {
      tracing::info!(index = %name, "index manager closed before the build could start");
      return;
    }
  };

  let dir = manager.index_dir(name);

  match manager.catalog.compare_and_set(name, IndexState::InBuildQueue, IndexState::Building) {
    Ok(true) => {}
    _ => {
      tracing::warn!(index = %name, "build worker picked up an index no longer queued; skipping");
      return;
    }
  }

  if let Err(err) = status::write_status(&dir, IndexState::Building) {
    tracing::error!(index = %name, error = %err, "failed to persist BUILDING status");
    manager.catalog.force_set(name, IndexState::Broken);
    broken_status_best_effort(&dir);
    return;
  }

  let params = manager.build_params();
  let progress = Arc::clone(&manager.progress);
  let index_name = name.to_string();
  let build_dir = dir.clone();
  let result = tokio::task::spawn_blocking(move || {
    let mut phases: Vec<BuildPhase> = Vec::new();
    vectoriadb_store::build(&build_dir, params, |phase| {
      match phases.iter_mut().find(|p| p.name == phase.name) {
        Some(existing) => *existing = phase.clone(),
        None => phases.push(phase.clone()),
      }
      progress.record(BuildProgress {
        index_name: index_name.clone(),
        phases: phases.clone(),
      });
    })
  })
  .await;

  manager.progress.clear(name);

  match result {
    Ok(Ok(())) => {
      manager.catalog.force_set(name, IndexState::Built);
      if let Err(err) = status::write_status(&dir, IndexState::Built) {
        tracing::error!(index = %name, error = %err, "failed to persist BUILT status");
      }
    }
    Ok(Err(err)) => {
      tracing::error!(index = %name, error = %err, "index build failed");
      manager.catalog.force_set(name, IndexState::Broken);
      broken_status_best_effort(&dir);
    }
    Err(join_err) => {
      tracing::error!(index = %name, error = %join_err, "index build task panicked");
      manager.catalog.force_set(name, IndexState::Broken);
      broken_status_best_effort(&dir);
    }
  }

  drop(permit);
}
