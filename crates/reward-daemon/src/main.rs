//! reward-daemon: serves rewarding reconciliation reports.
//!
//! Single OS process running a Tokio async runtime. Operators and tooling
//! query the reports written by the epoch scheduler via JSON-RPC over a
//! Unix socket.

mod commands;
mod config;
mod rpc;

use std::sync::Arc;
use std::time::SystemTime;

use tracing::{error, info};

use crate::config::DaemonConfig;
use crate::rpc::RpcServer;

/// Daemon-wide shared state.
pub struct DaemonState {
    /// Database connection.
    pub db: Arc<tokio::sync::Mutex<rusqlite::Connection>>,
    /// Configuration.
    pub config: DaemonConfig,
    pub started_at: SystemTime,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = DaemonConfig::load()?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("reward={}", config.advanced.log_level).parse()?),
        )
        .init();

    info!("Reward daemon starting");

    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;

    let db_path = data_dir.join("rewarding.db");
    let conn = reward_db::open(&db_path)?;
    info!("Opened report store at {:?}", db_path);

    let state = Arc::new(DaemonState {
        db: Arc::new(tokio::sync::Mutex::new(conn)),
        config,
        started_at: SystemTime::now(),
    });

    let socket_path = data_dir.join("daemon.sock");
    let rpc_server = RpcServer::new(state.clone(), socket_path.clone());

    info!("Starting JSON-RPC server on {:?}", socket_path);

    tokio::select! {
        result = rpc_server.run() => {
            if let Err(e) = result {
                error!("RPC server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
        }
    }

    let _ = std::fs::remove_file(&socket_path);

    info!("Daemon stopped");
    Ok(())
}
