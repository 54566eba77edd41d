//! The TCP front door: an accept loop handing each connection its own ndjson
//! request/response exchange, plus the two streaming methods' wire protocol.
//! Mirrors the teacher's `daemon::server` Unix-socket accept loop and
//! `ShutdownHandle` broadcast, generalized from a local socket to a TCP
//! listener since a vector database service is network-facing rather than a
//! single-host daemon.

use crate::router;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use vectoriadb_core::Status;
use vectoriadb_manager::IndexManager;
use vectoriadb_rpc::{Method, Request, Response, RpcError, UploadChunkParams, UploadVectorsResult};

#[derive(Error, Debug)]
pub enum TransportError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
}

/// Handle to ask a running [`Server`] to stop accepting connections and
/// return from [`Server::run`].
#[derive(Clone)]
pub struct ShutdownHandle {
  tx: broadcast::Sender<()>,
}

impl ShutdownHandle {
  pub fn shutdown(&self) {
    let _ = self.tx.send(());
  }
}

pub struct Server {
  listener: TcpListener,
  manager: Arc<IndexManager>,
  shutdown_tx: broadcast::Sender<()>,
}

impl Server {
  /// Bind the listener up front so the caller (and tests) can learn the
  /// actual address before entering the accept loop — useful with an
  /// ephemeral `:0` port.
  pub async fn bind(listen_addr: &str, manager: Arc<IndexManager>) -> Result<Self, TransportError> {
    let listener = TcpListener::bind(listen_addr).await?;
    let (shutdown_tx, _) = broadcast::channel(1);
    Ok(Self {
      listener,
      manager,
      shutdown_tx,
    })
  }

  pub fn local_addr(&self) -> Result<std::net::SocketAddr, TransportError> {
    Ok(self.listener.local_addr()?)
  }

  pub fn shutdown_handle(&self) -> ShutdownHandle {
    ShutdownHandle {
      tx: self.shutdown_tx.clone(),
    }
  }

  /// Accept connections until a shutdown signal arrives. Each connection is
  /// handled on its own task; this method does not wait for in-flight
  /// connections to finish (that's `IndexManager::shutdown`'s drain, which
  /// the caller runs separately before dropping the manager).
  pub async fn run(&self) -> Result<(), TransportError> {
    info!(addr = ?self.listener.local_addr(), "listening");

    let mut shutdown_rx = self.shutdown_tx.subscribe();
    loop {
      tokio::select! {
        result = self.listener.accept() => {
          match result {
            Ok((stream, peer)) => {
              let manager = Arc::clone(&self.manager);
              tokio::spawn(async move {
                if let Err(err) = handle_connection(stream, manager).await {
                  debug!(%peer, error = %err, "connection ended");
                }
              });
            }
            Err(err) => error!(error = %err, "accept error"),
          }
        }
        _ = shutdown_rx.recv() => {
          info!("shutdown signal received, no longer accepting connections");
          break;
        }
      }
    }

    Ok(())
  }
}

async fn handle_connection(stream: TcpStream, manager: Arc<IndexManager>) -> Result<(), TransportError> {
  let (reader, mut writer) = stream.into_split();
  let mut reader = BufReader::new(reader);
  let mut line = String::new();

  loop {
    line.clear();
    if reader.read_line(&mut line).await? == 0 {
      break;
    }
    let trimmed = line.trim();
    if trimmed.is_empty() {
      continue;
    }

    let request: Request<serde_json::Value> = match serde_json::from_str(trimmed) {
      Ok(request) => request,
      Err(err) => {
        warn!(error = %err, "malformed request line");
        continue;
      }
    };

    match request.method {
      Method::UploadVectors => {
        handle_upload_stream(&manager, request.id, request.params, &mut reader, &mut writer).await?;
      }
      Method::BuildStatus => {
        handle_build_status_stream(&manager, request.id, &mut writer).await?;
        return Ok(());
      }
      _ => {
        let response = router::handle(&manager, request).await;
        write_frame(&mut writer, &response).await?;
      }
    }
  }

  Ok(())
}

/// Consume a whole `uploadVectors` stream: the first line is already parsed
/// (`first`); subsequent lines are read directly off `reader` until one
/// arrives with `complete: true` or an error terminates the session. Exactly
/// one `Response<UploadVectorsResult>` is written at the end.
async fn handle_upload_stream(
  manager: &Arc<IndexManager>,
  id: u64,
  first_params: serde_json::Value,
  reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>,
  writer: &mut tokio::net::tcp::OwnedWriteHalf,
) -> Result<(), TransportError> {
  let mut session = match manager.start_upload_session().await {
    Ok(session) => session,
    Err(err) => {
      write_frame(writer, &Response::<()>::failure(id, RpcError::from(err))).await?;
      return Ok(());
    }
  };

  let mut frame: UploadChunkParams = match serde_json::from_value(first_params) {
    Ok(frame) => frame,
    Err(err) => {
      let status = session.fail(Status::invalid_argument(format!("bad params: {err}"))).await;
      write_frame(writer, &Response::<()>::failure(id, RpcError::from(status))).await?;
      return Ok(());
    }
  };

  loop {
    if frame.complete {
      break;
    }
    if let Err(err) = session.chunk(&frame.index_name, &frame.vector, &frame.id).await {
      let status = session.fail(err).await;
      write_frame(writer, &Response::<()>::failure(id, RpcError::from(status))).await?;
      return drain_upload_stream(reader).await;
    }

    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
      // Client hung up mid-stream; the session is abandoned, not completed.
      let status = session.fail(Status::internal("client disconnected mid-upload")).await;
      tracing::warn!(error = %status, "upload stream ended without a completion frame");
      return Ok(());
    }
    let trimmed = line.trim();
    if trimmed.is_empty() {
      continue;
    }
    let next: Request<UploadChunkParams> = match serde_json::from_str(trimmed) {
      Ok(next) => next,
      Err(err) => {
        let status = session.fail(Status::invalid_argument(format!("bad params: {err}"))).await;
        write_frame(writer, &Response::<()>::failure(id, RpcError::from(status))).await?;
        return Ok(());
      }
    };
    frame = next.params;
  }

  match session.complete().await {
    Ok(()) => write_frame(writer, &Response::success(id, UploadVectorsResult {})).await,
    Err(err) => write_frame(writer, &Response::<()>::failure(id, RpcError::from(err))).await,
  }
}

/// After a chunk error, keep reading and discarding frames until the client
/// sends its completion marker, so the next line on the connection is the
/// start of an unrelated request rather than a stray upload chunk.
async fn drain_upload_stream(reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>) -> Result<(), TransportError> {
  let mut line = String::new();
  loop {
    line.clear();
    if reader.read_line(&mut line).await? == 0 {
      return Ok(());
    }
    let trimmed = line.trim();
    if trimmed.is_empty() {
      continue;
    }
    match serde_json::from_str::<Request<UploadChunkParams>>(trimmed) {
      Ok(next) if next.params.complete => return Ok(()),
      _ => continue,
    }
  }
}

/// `buildStatus`: occupies the rest of the connection, writing one progress
/// frame per tick until the client disconnects.
async fn handle_build_status_stream(
  manager: &Arc<IndexManager>,
  id: u64,
  writer: &mut tokio::net::tcp::OwnedWriteHalf,
) -> Result<(), TransportError> {
  let mut receiver = match manager.build_status().await {
    Ok(receiver) => receiver,
    Err(err) => return write_frame(writer, &Response::<()>::failure(id, RpcError::from(err))).await,
  };

  while let Some(progress) = receiver.recv().await {
    if write_frame(writer, &Response::progress_update(id, progress)).await.is_err() {
      break;
    }
  }
  Ok(())
}

async fn write_frame<R: serde::Serialize>(
  writer: &mut tokio::net::tcp::OwnedWriteHalf,
  response: &Response<R>,
) -> Result<(), TransportError> {
  let mut json = serde_json::to_vec(response).expect("Response always serializes");
  json.push(b'\n');
  writer.write_all(&json).await?;
  writer.flush().await?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::client::Client;
  use tempfile::TempDir;
  use vectoriadb_core::{Config, Distance, IndexConfig, ServerConfig};
  use vectoriadb_rpc::{
    CreateIndexParams, DropIndexParams, FindNearestNeighboursParams, ListIndexesParams, RetrieveIndexStateParams,
    TriggerIndexBuildParams, UploadChunkParams,
  };

  async fn manager(dir: &TempDir, dims: usize) -> Arc<IndexManager> {
    let config = Config {
      index: IndexConfig {
        dimensions: dims,
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

  async fn start_server(dir: &TempDir, dims: usize) -> (Server, Arc<IndexManager>) {
    let manager = manager(dir, dims).await;
    let server = Server::bind("127.0.0.1:0", Arc::clone(&manager)).await.unwrap();
    (server, manager)
  }

  #[tokio::test]
  async fn create_upload_build_and_query_round_trip_over_tcp() {
    let dir = TempDir::new().unwrap();
    let (server, manager) = start_server(&dir, 2).await;
    let addr = server.local_addr().unwrap().to_string();
    tokio::spawn(async move { server.run().await });

    let mut client = Client::connect(&addr).await.unwrap();

    let create = client
      .call(Method::CreateIndex, CreateIndexParams { name: "a".to_string(), distance: Distance::L2 })
      .await
      .unwrap();
    assert!(create.error.is_none());

    // One connection, one request at a time: uploadVectors occupies it for
    // the stream's duration, then normal request/response resumes.
    let request = Request {
      id: 1,
      method: Method::UploadVectors,
      params: UploadChunkParams { index_name: "a".to_string(), vector: vec![0.0, 0.0], id: b"origin".to_vec(), complete: false },
    };
    let mut json = serde_json::to_vec(&request).unwrap();
    json.push(b'\n');
    client_write(&mut client, &json).await;

    let complete_request = Request {
      id: 1,
      method: Method::UploadVectors,
      params: UploadChunkParams { complete: true, ..Default::default() },
    };
    let mut complete_json = serde_json::to_vec(&complete_request).unwrap();
    complete_json.push(b'\n');
    client_write(&mut client, &complete_json).await;

    let response = client_read(&mut client).await;
    assert!(response.error.is_none(), "upload failed: {:?}", response.error);

    client
      .call(Method::TriggerIndexBuild, TriggerIndexBuildParams { name: "a".to_string() })
      .await
      .unwrap();

    for _ in 0..200 {
      let state = client
        .call(Method::RetrieveIndexState, RetrieveIndexStateParams { name: "a".to_string() })
        .await
        .unwrap();
      if state.result.unwrap()["state"] == "Built" {
        break;
      }
      tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    manager.switch_to_search_mode().await.unwrap();
    let found = client
      .call(
        Method::FindNearestNeighbours,
        FindNearestNeighboursParams { index_name: "a".to_string(), k: 1, vector: vec![0.1, 0.1] },
      )
      .await
      .unwrap();
    assert_eq!(found.result.unwrap()["ids"], serde_json::json!([[111, 114, 105, 103, 105, 110]]));
  }

  #[tokio::test]
  async fn list_indexes_over_tcp() {
    let dir = TempDir::new().unwrap();
    let (server, manager) = start_server(&dir, 2).await;
    let addr = server.local_addr().unwrap().to_string();
    tokio::spawn(async move { server.run().await });

    manager.create_index("a", Distance::L2).await.unwrap();

    let mut client = Client::connect(&addr).await.unwrap();
    let response = client.call(Method::ListIndexes, ListIndexesParams {}).await.unwrap();
    assert_eq!(response.result.unwrap()["names"], serde_json::json!(["a"]));
  }

  #[tokio::test]
  async fn drop_unknown_index_is_not_found() {
    let dir = TempDir::new().unwrap();
    let (server, _manager) = start_server(&dir, 2).await;
    let addr = server.local_addr().unwrap().to_string();
    tokio::spawn(async move { server.run().await });

    let mut client = Client::connect(&addr).await.unwrap();
    let response = client.call(Method::DropIndex, DropIndexParams { name: "missing".to_string() }).await.unwrap();
    let error = response.error.unwrap();
    assert_eq!(error.code, "NOT_FOUND");
  }

  async fn client_write(client: &mut Client, bytes: &[u8]) {
    client.raw_write(bytes).await.unwrap();
  }

  async fn client_read(client: &mut Client) -> Response<serde_json::Value> {
    client.raw_read().await.unwrap()
  }
}
