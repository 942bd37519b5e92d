//! Admin API: operator tooling over policies, threat patterns, the
//! audit trail, and manual origin blocks. Bearer-token guarded and
//! outside the validation middleware.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/policies", get(list_policies))
        .route("/admin/policies/{id}", put(update_policy))
        .route("/admin/threat-patterns", get(list_patterns))
        .route("/admin/threat-patterns/{id}", put(update_pattern))
        .route("/admin/audit-logs", get(query_audit_logs))
        .route("/admin/audit-logs/export", post(export_audit_logs))
        .route("/admin/audit-logs/statistics", get(audit_statistics))
        .route("/admin/block-ip", post(block_ip))
        .route("/admin/metrics", get(metrics_summary))
        .route("/admin/health", get(health))
        .layer(middleware::from_fn_with_state(
            state,
            admin_auth_middleware,
        ))
}
