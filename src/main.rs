//! Security validation gateway.
//!
//! Request-time admission control for the platform's API surface:
//! every inbound request is checked against a blocked-origin set, a
//! per-principal rate limit, known threat signatures, a behavioral
//! anomaly score, and operator-defined policies before it reaches a
//! handler, with every consequential decision written to the audit
//! trail.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────┐
//!                    │                 SECURITY GATEWAY                  │
//!                    │                                                   │
//!  Client Request    │  ┌────────┐   ┌───────────────────────────────┐  │
//!  ──────────────────┼─▶│  http  │──▶│ validation pipeline           │  │
//!                    │  │ server │   │ blocked → rate → threat →     │  │
//!                    │  └────────┘   │ anomaly → policy              │  │
//!                    │       │       └───────────────┬───────────────┘  │
//!                    │       │                       │                  │
//!  403 / 429 / 200   │       │                       ▼                  │
//!  ◀─────────────────┼───────┘               ┌──────────────┐           │
//!                    │                       │ audit trail  │           │
//!                    │                       └──────────────┘           │
//!                    │  ┌─────────────────────────────────────────────┐ │
//!                    │  │           Cross-Cutting Concerns            │ │
//!                    │  │  ┌────────┐ ┌─────────┐ ┌────────────────┐  │ │
//!                    │  │  │ config │ │ admin   │ │ observability  │  │ │
//!                    │  │  │ reload │ │ API     │ │ logs + metrics │  │ │
//!                    │  │  └────────┘ └─────────┘ └────────────────┘  │ │
//!                    │  │  ┌─────────────────────────────────────┐    │ │
//!                    │  │  │ sweeper: maintenance / session      │    │ │
//!                    │  │  │ reaper / threat-intel refresh       │    │ │
//!                    │  │  └─────────────────────────────────────┘    │ │
//!                    │  └─────────────────────────────────────────────┘ │
//!                    └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use sentinel_gate::config::{load_config, GatewayConfig};
use sentinel_gate::config::watcher::ConfigWatcher;
use sentinel_gate::http::HttpServer;
use sentinel_gate::lifecycle::Shutdown;
use sentinel_gate::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "sentinel-gate", about = "Request-time security validation gateway")]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init_logging(&config.observability);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        rate_window_ms = config.rate_limit.window_ms,
        rate_max_requests = config.rate_limit.max_requests,
        admin_enabled = config.admin.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => {
                tracing::error!(
                    metrics_address = %config.observability.metrics_address,
                    "Failed to parse metrics address"
                );
            }
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(address = %local_addr, "Listening for connections");

    // Config hot reload when a file is in play.
    let (config_tx, config_rx) = mpsc::unbounded_channel();
    let _watcher = match &args.config {
        Some(path) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            let tx = config_tx.clone();
            tokio::spawn(async move {
                while let Some(update) = updates.recv().await {
                    let _ = tx.send(update);
                }
            });
            Some(watcher.run()?)
        }
        None => None,
    };
    drop(config_tx);

    let shutdown = Shutdown::new();
    shutdown.trigger_on_ctrl_c();

    let server = HttpServer::new(config);
    server.run(listener, config_rx, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
