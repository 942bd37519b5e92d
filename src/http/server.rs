//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the validation middleware in front
//! - Wire up middleware (tracing, timeout, request ID)
//! - Mount the admin router when enabled
//! - Spawn the background sweeper
//! - Apply hot-reloaded configuration
//! - Serve with graceful shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::Extension,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::any,
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::setup_admin_router;
use crate::audit::{AuditTrail, MemoryAuditStore};
use crate::config::GatewayConfig;
use crate::security::context::SecurityContext;
use crate::security::orchestrator::SecurityGateway;
use crate::security::sweeper::Sweeper;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<SecurityGateway>,
    pub admin_api_key: Arc<String>,
}

/// HTTP server for the security gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    gateway: Arc<SecurityGateway>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig) -> Self {
        let store = Arc::new(MemoryAuditStore::new(config.audit.max_entries));
        let audit = AuditTrail::new(store);
        let gateway = Arc::new(SecurityGateway::new(&config, audit));

        let state = AppState {
            gateway: gateway.clone(),
            admin_api_key: Arc::new(config.admin.api_key.clone()),
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            gateway,
        }
    }

    /// Build the router: validated application surface plus the admin
    /// surface (auth-guarded, not validation-guarded, so an operator can
    /// still reach it while their origin is rate limited).
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let protected = Router::new()
            .route("/", any(admitted_handler))
            .route("/{*path}", any(admitted_handler))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                crate::http::middleware::validation_middleware,
            ));

        let mut router = Router::new();
        if config.admin.enabled {
            router = router.merge(setup_admin_router(state.clone()));
        }

        router
            .merge(protected)
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.listener.request_timeout_secs,
            )))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        // Background maintenance loops.
        let sweeper = Sweeper::new(
            self.gateway.clone(),
            self.config.sweeps.clone(),
            self.config.threat_intel.clone(),
            self.config.audit.clone(),
        );
        let sweeper_shutdown = shutdown.resubscribe();
        tokio::spawn(async move {
            sweeper.run(sweeper_shutdown).await;
        });

        // Hot-reload applier.
        let gateway = self.gateway.clone();
        tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                gateway.apply_config(&new_config);
            }
        });

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Handle on the pipeline, mainly for tests and embedding.
    pub fn gateway(&self) -> Arc<SecurityGateway> {
        self.gateway.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Terminal handler for admitted requests. In deployment the validated
/// router fronts the platform's own routes; standalone, it confirms
/// admission so callers and tests can observe the decision.
async fn admitted_handler(Extension(ctx): Extension<SecurityContext>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "allowed": true,
            "principal": ctx.principal,
            "request_id": ctx.request_id,
        })),
    )
}
