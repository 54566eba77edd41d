//! A minimal TCP client for the CLI's `status`/`list` subcommands, also
//! reused by the transport integration tests to drive the streaming
//! methods directly. Mirrors the teacher's `daemon::server::Client`: a
//! persistent connection, one ndjson line per request and per response.

use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use vectoriadb_rpc::{Method, Request, Response};

#[derive(Error, Debug)]
pub enum ClientError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

pub struct Client {
  reader: BufReader<OwnedReadHalf>,
  writer: OwnedWriteHalf,
}

impl Client {
  pub async fn connect(addr: &str) -> Result<Self, ClientError> {
    let stream = TcpStream::connect(addr).await?;
    let (reader, writer) = stream.into_split();
    Ok(Self {
      reader: BufReader::new(reader),
      writer,
    })
  }

  /// Send one request and read back its single response. Do not use this
  /// for `uploadVectors`/`buildStatus`, whose exchange spans several lines;
  /// use `raw_write`/`raw_read` directly for those.
  pub async fn call<P: serde::Serialize>(
    &mut self,
    method: Method,
    params: P,
  ) -> Result<Response<serde_json::Value>, ClientError> {
    let request = Request {
      id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
      method,
      params,
    };
    let mut json = serde_json::to_vec(&request)?;
    json.push(b'\n');
    self.raw_write(&json).await?;
    self.raw_read().await
  }

  pub async fn raw_write(&mut self, bytes: &[u8]) -> Result<(), ClientError> {
    self.writer.write_all(bytes).await?;
    self.writer.flush().await?;
    Ok(())
  }

  pub async fn raw_read(&mut self) -> Result<Response<serde_json::Value>, ClientError> {
    let mut line = String::new();
    self.reader.read_line(&mut line).await?;
    Ok(serde_json::from_str(&line)?)
  }
}
