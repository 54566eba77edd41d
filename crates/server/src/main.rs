//! The `vectoriadb` binary: bootstraps an `IndexManager` and the TCP front
//! door, or acts as a thin client against one. Subcommand layout and
//! logging setup follow the teacher's `cli::main` (`clap::Parser` +
//! `tracing_subscriber` registry with console/file layers).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use vectoriadb_core::Config;
use vectoriadb_manager::IndexManager;
use vectoriadb_rpc::{ListIndexesParams, Method, RetrieveIndexStateParams};
use vectoriadb_server::{Client, Server};

#[derive(Parser)]
#[command(name = "vectoriadb")]
#[command(about = "A vector database index manager")]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run the index manager and its RPC listener.
  Serve {
    /// Directory holding config/, indexes/ and logs/.
    #[arg(long, default_value = ".")]
    base_path: PathBuf,
  },
  /// Print one index's lifecycle state.
  Status {
    name: String,
    #[arg(long, default_value = "127.0.0.1:7667")]
    addr: String,
  },
  /// List every index the manager currently knows about.
  List {
    #[arg(long, default_value = "127.0.0.1:7667")]
    addr: String,
  },
}

fn init_client_logging() {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
    .init();
}

/// File + console logging for `serve`, mirroring the teacher's daily rolling
/// appender. Returns the guard that must stay alive for the process's
/// lifetime or the non-blocking writer stops flushing.
fn init_serve_logging(base_path: &std::path::Path) -> Option<WorkerGuard> {
  let log_dir = base_path.join(vectoriadb_manager::LOGS_DIR);
  if std::fs::create_dir_all(&log_dir).is_err() {
    init_client_logging();
    return None;
  }

  let file_appender = tracing_appender::rolling::daily(&log_dir, "vectoriadb.log");
  let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

  let env_filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
  let console_layer = tracing_subscriber::fmt::layer().with_target(true).with_ansi(true);
  let file_layer = tracing_subscriber::fmt::layer().with_target(true).with_ansi(false).with_writer(file_writer);

  tracing_subscriber::registry().with(env_filter).with(console_layer).with(file_layer).init();
  Some(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();

  let _guard = match &cli.command {
    Commands::Serve { base_path } => init_serve_logging(base_path),
    _ => {
      init_client_logging();
      None
    }
  };

  match cli.command {
    Commands::Serve { base_path } => cmd_serve(base_path).await,
    Commands::Status { name, addr } => cmd_status(&name, &addr).await,
    Commands::List { addr } => cmd_list(&addr).await,
  }
}

async fn cmd_serve(base_path: PathBuf) -> Result<()> {
  let config = Config::load(&base_path).context("failed to load configuration")?;
  let listen_addr = config.server.listen_addr.clone();

  let manager = IndexManager::new(config).await.context("failed to start index manager")?;
  let server = Server::bind(&listen_addr, Arc::clone(&manager)).await.context("failed to bind listener")?;
  let shutdown = server.shutdown_handle();

  let manager_for_signal = Arc::clone(&manager);
  let shutdown_for_signal = shutdown.clone();
  let signal_task = tokio::spawn(async move {
    if let Err(err) = tokio::signal::ctrl_c().await {
      warn!(error = %err, "failed to listen for ctrl-c");
      return;
    }
    info!("received ctrl-c, draining in-flight operations");
    shutdown_for_signal.shutdown();
    manager_for_signal.shutdown().await;
  });

  server.run().await.context("server loop exited with an error")?;
  // The accept loop stops as soon as the shutdown broadcast fires, which can
  // race ahead of the manager's drain; wait for that to finish too so the
  // process doesn't exit mid-drain.
  let _ = signal_task.await;
  Ok(())
}

async fn cmd_status(name: &str, addr: &str) -> Result<()> {
  let mut client = Client::connect(addr).await.context("failed to connect")?;
  let response = client
    .call(Method::RetrieveIndexState, RetrieveIndexStateParams { name: name.to_string() })
    .await
    .context("request failed")?;
  match (response.result, response.error) {
    (Some(result), _) => println!("{}", serde_json::to_string_pretty(&result)?),
    (None, Some(error)) => anyhow::bail!("{}: {}", error.code, error.message),
    (None, None) => anyhow::bail!("empty response"),
  }
  Ok(())
}

async fn cmd_list(addr: &str) -> Result<()> {
  let mut client = Client::connect(addr).await.context("failed to connect")?;
  let response = client
    .call(Method::ListIndexes, ListIndexesParams {})
    .await
    .context("request failed")?;
  match (response.result, response.error) {
    (Some(result), _) => println!("{}", serde_json::to_string_pretty(&result)?),
    (None, Some(error)) => anyhow::bail!("{}: {}", error.code, error.message),
    (None, None) => anyhow::bail!("empty response"),
  }
  Ok(())
}
