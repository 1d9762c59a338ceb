//! dockerd-config-manager
//!
//! Serves a small web UI for editing the container daemon's `dockerd.json`
//! on a single host.
//!
//! # Architecture Overview
//!
//! ```text
//!     Browser / confctl
//!            │
//!            ▼
//!     ┌─────────────┐      ┌──────────────────────┐      ┌──────────────┐
//!     │    http     │─────▶│   daemon engine      │─────▶│ dockerd.json │
//!     │ API + SSE   │      │ schema / backups     │      │  + backups/  │
//!     └──────┬──────┘      └──────────────────────┘      └──────────────┘
//!            │
//!            ▼
//!     ┌─────────────┐
//!     │   service   │──── status / restart / journal / probes
//!     └─────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use dockerd_config_manager::config::load_config;
use dockerd_config_manager::daemon::ConfigEngine;
use dockerd_config_manager::http::HttpServer;
use dockerd_config_manager::lifecycle::{signals, Shutdown};
use dockerd_config_manager::observability::{logging, metrics};
use dockerd_config_manager::service::{system, RestartCoordinator};

#[derive(Parser)]
#[command(name = "dockerd-config-manager")]
#[command(about = "Web manager for the container daemon configuration", long_about = None)]
struct Args {
    /// Manager settings (TOML). Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen address, e.g. 0.0.0.0:8888.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "dockerd-config-manager starting");
    tracing::info!(
        daemon_config = %config.paths.daemon_config.display(),
        backup_dir = %config.paths.backup_dir.display(),
        bind_address = %config.listener.bind_address,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    if !system::is_root() {
        tracing::warn!(
            "Not running as root; writing the daemon configuration and restarting it will likely fail"
        );
    }

    let engine = Arc::new(ConfigEngine::new(config.engine_settings()));
    engine.backups().init()?;
    if !engine.file_info().exists {
        tracing::warn!(
            path = %engine.config_path().display(),
            "Daemon configuration not found; reads will fail until it exists"
        );
    }

    let config = Arc::new(config);
    let restart = Arc::new(RestartCoordinator::new(config.service.clone()));
    let shutdown = Arc::new(Shutdown::new());

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    tokio::spawn(signals::wait_for_signal(Arc::clone(&shutdown)));

    let server = HttpServer::new(config, engine, restart, shutdown);
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
