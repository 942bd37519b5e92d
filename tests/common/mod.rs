//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;

use sentinel_gate::config::GatewayConfig;
use sentinel_gate::http::HttpServer;
use sentinel_gate::lifecycle::Shutdown;
use sentinel_gate::security::SecurityGateway;

pub const ADMIN_KEY: &str = "integration-test-key";

/// Config with fast limits and the admin API enabled.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.admin.enabled = true;
    config.admin.api_key = ADMIN_KEY.to_string();
    config.observability.metrics_enabled = false;
    config
}

/// Start a gateway on an ephemeral port. Returns its address, a handle
/// on the pipeline, and the shutdown coordinator.
pub async fn start_gateway(config: GatewayConfig) -> (SocketAddr, Arc<SecurityGateway>, Shutdown) {
    let shutdown = Shutdown::new();
    let (_config_tx, config_rx) = mpsc::unbounded_channel();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(config);
    let gateway = server.gateway();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, config_rx, server_shutdown).await;
    });

    // Give the server a beat to start accepting.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    (addr, gateway, shutdown)
}

/// Client that never reuses pooled connections between tests.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
