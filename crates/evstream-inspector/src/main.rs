//! Evstream Inspector Daemon
//!
//! Stores event records pushed by producers and serves them to the
//! companion inspector CLI over a single identity-checked connection.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tracing::info;

use evstream_inspector::relay::InspectorRelay;
use evstream_inspector::server;
use evstream_inspector::storage::EventStreamStore;

#[derive(Parser, Debug)]
#[command(name = "evstream-inspector")]
#[command(version, about = "Evstream inspector daemon - event collection relay")]
struct Args {
    /// TCP bind address for inspector connections
    #[arg(long, default_value = "127.0.0.1:9750", env = "EVSTREAM_ADDR")]
    addr: SocketAddr,

    /// Event database file path
    #[arg(long, env = "EVSTREAM_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Instance identity a peer must present to connect (generated if absent)
    #[arg(long, env = "EVSTREAM_INSTANCE_ID")]
    instance_id: Option<String>,

    /// Log level filter for the daemon (e.g. "info", "debug", "warn").
    #[arg(long, default_value = "info", env = "EVSTREAM_LOG_LEVEL")]
    log_level: String,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, env = "EVSTREAM_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_filter = format!(
        "evstream_inspector={level},evstream_core={level}",
        level = args.log_level
    );
    evstream_core::tracing_init::init_tracing(&log_filter, args.log_json);

    let instance_id = args
        .instance_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %args.addr,
        instance_id = %instance_id,
        "Starting evstream-inspector"
    );

    let db_path = match args.db_path {
        Some(path) => path,
        None => default_db_path()?,
    };
    info!(path = %db_path.display(), "Opening event store");
    let store = EventStreamStore::open(&db_path).await?;

    let (connections_tx, connections_rx) = mpsc::channel(8);
    let relay = InspectorRelay::new(instance_id, store, connections_rx);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let relay_handle = tokio::spawn(relay.run(shutdown_tx.subscribe()));

    let listener = TcpListener::bind(args.addr).await?;

    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    // Notify systemd that the daemon is ready to serve (unix only).
    #[cfg(unix)]
    sd_notify::notify(true, &[sd_notify::NotifyState::Ready])?;

    #[cfg(unix)]
    let sigterm_future = sigterm.recv();
    #[cfg(not(unix))]
    let sigterm_future = std::future::pending::<Option<()>>();

    info!(addr = %args.addr, "Inspector frontend ready");

    tokio::select! {
        result = server::serve(listener, connections_tx, shutdown_rx) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C shutdown signal");
        }
        _ = sigterm_future => {
            info!("Received SIGTERM shutdown signal");
        }
    }

    // Signal the relay to shut down and wait for it to drain.
    let _ = shutdown_tx.send(true);
    let _ = relay_handle.await;

    info!("Daemon stopped");
    Ok(())
}

/// Default event database path: ~/.evstream/events.db
fn default_db_path() -> anyhow::Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(home.join(".evstream").join("events.db"))
}
