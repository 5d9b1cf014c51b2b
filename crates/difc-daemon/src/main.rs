//! difcd - DIFC reference-monitor daemon.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use difc_daemon::state::DaemonStateHandle;
use difc_daemon::{SocketManager, SocketManagerConfig};
use tokio::signal::unix::{SignalKind, signal};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// DIFC reference-monitor daemon.
#[derive(Parser, Debug)]
#[command(name = "difcd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory for the daemon's Unix sockets.
    #[arg(long, default_value = "/run/difcd")]
    runtime_dir: PathBuf,

    /// Control socket filename (privileged operations, mode 0600).
    #[arg(long, default_value = "control.sock")]
    control_socket: String,

    /// Query socket filename (label queries and taints, mode 0660).
    #[arg(long, default_value = "query.sock")]
    query_socket: String,

    /// Maximum concurrent connections across both sockets.
    #[arg(long, default_value_t = 64)]
    max_connections: usize,

    /// Log filter, e.g. `info` or `difc_daemon=debug`.
    #[arg(long, default_value = "info")]
    log_filter: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&args.log_filter))
                .context("invalid log filter")?,
        )
        .init();

    let state = DaemonStateHandle::new();
    let config = SocketManagerConfig {
        runtime_dir: args.runtime_dir,
        control_socket_name: args.control_socket,
        query_socket_name: args.query_socket,
        max_connections: args.max_connections,
    };
    let manager = SocketManager::bind(&config, Arc::clone(state.monitor()))
        .context("failed to bind monitor sockets")?;

    let mut sigterm = signal(SignalKind::terminate()).context("failed to install SIGTERM")?;
    let mut sigint = signal(SignalKind::interrupt()).context("failed to install SIGINT")?;
    let signal_state = Arc::clone(&state);
    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM"),
            _ = sigint.recv() => info!("received SIGINT"),
        }
        signal_state.request_shutdown();
    });

    manager.run(state.shutdown_signal()).await;
    info!(uptime_secs = state.uptime_secs(), "daemon stopped");
    Ok(())
}
