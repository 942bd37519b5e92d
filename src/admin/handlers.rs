//! Admin API handlers: operator surfaces over the pipeline registries
//! and the audit trail.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::audit::{AuditFilter, AuditLogEntry, AuditStatistics, ExportFormat};
use crate::error::GatewayError;
use crate::http::server::AppState;
use crate::security::policy::{PolicyUpdate, SecurityPolicy};
use crate::security::threat::{PatternUpdate, ThreatPattern};

/// Map registry errors onto admin API status codes.
pub struct ApiError(GatewayError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            GatewayError::UnknownPolicy(_) | GatewayError::UnknownPattern(_) => {
                StatusCode::NOT_FOUND
            }
            GatewayError::InvalidSignature(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GatewayError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        Self(e)
    }
}

pub async fn list_policies(State(state): State<AppState>) -> Json<Vec<SecurityPolicy>> {
    Json(state.gateway.policies().list())
}

pub async fn update_policy(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<PolicyUpdate>,
) -> Result<Json<SecurityPolicy>, ApiError> {
    let policy = state.gateway.policies().update(&id, update)?;
    tracing::info!(policy = %id, "Policy updated");
    Ok(Json(policy))
}

pub async fn list_patterns(State(state): State<AppState>) -> Json<Vec<ThreatPattern>> {
    Json(state.gateway.patterns().list())
}

pub async fn update_pattern(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<PatternUpdate>,
) -> Result<Json<ThreatPattern>, ApiError> {
    let pattern = state.gateway.patterns().update(&id, update)?;
    tracing::info!(pattern = %id, "Threat pattern updated");
    Ok(Json(pattern))
}

#[derive(Serialize)]
pub struct AuditPage {
    pub entries: Vec<AuditLogEntry>,
    pub total: usize,
}

pub async fn query_audit_logs(
    State(state): State<AppState>,
    Query(filter): Query<AuditFilter>,
) -> Json<AuditPage> {
    let (entries, total) = state.gateway.audit().query(&filter);
    Json(AuditPage { entries, total })
}

#[derive(Deserialize)]
pub struct ExportParams {
    pub format: ExportFormat,
}

pub async fn export_audit_logs(
    State(state): State<AppState>,
    Query(params): Query<ExportParams>,
    Json(filter): Json<AuditFilter>,
) -> Result<Response, ApiError> {
    let body = state.gateway.audit().export(&filter, params.format)?;
    let disposition = format!("attachment; filename=\"{}\"", params.format.file_name());
    let response = (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, params.format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response();
    Ok(response)
}

pub async fn audit_statistics(
    State(state): State<AppState>,
    Query(filter): Query<AuditFilter>,
) -> Json<AuditStatistics> {
    Json(state.gateway.audit().statistics(filter.from, filter.to))
}

#[derive(Deserialize)]
pub struct BlockRequest {
    pub address: String,
    pub reason: String,
    pub duration_ms: Option<u64>,
}

pub async fn block_ip(
    State(state): State<AppState>,
    Json(request): Json<BlockRequest>,
) -> impl IntoResponse {
    state
        .gateway
        .block_origin(&request.address, &request.reason, request.duration_ms);
    (
        StatusCode::OK,
        Json(json!({
            "blocked": request.address,
            "duration_ms": request.duration_ms,
        })),
    )
}

pub async fn metrics_summary(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.gateway.snapshot())
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.gateway.snapshot();
    if state.gateway.is_healthy() {
        (
            StatusCode::OK,
            Json(json!({ "status": "healthy", "snapshot": snapshot })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unhealthy", "snapshot": snapshot })),
        )
    }
}
