//! Request validation middleware.
//!
//! This is the collaborator seam: the middleware extracts a
//! SecurityContext from transport-level material (headers,
//! connect-info), hands it to the gateway, and maps the verdict onto an
//! HTTP response. Everything behind it sees only admitted requests, with
//! the context attached as a request extension.

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::http::server::AppState;
use crate::security::context::{SecurityContext, ANONYMOUS_PRINCIPAL, NO_SESSION};

pub async fn validation_middleware(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let ctx = extract_context(request.headers(), addr);
    let verdict = state.gateway.validate(&ctx);

    if verdict.allowed {
        request.extensions_mut().insert(ctx);
        return next.run(request).await;
    }

    let status =
        StatusCode::from_u16(verdict.status).unwrap_or(StatusCode::FORBIDDEN);
    let body = Json(json!({
        "allowed": false,
        "status_code": verdict.status,
        "message": verdict.message,
    }));

    let mut response = (status, body).into_response();
    if let Some(retry_after) = verdict.retry_after_secs {
        if let Ok(value) = header::HeaderValue::from_str(&retry_after.to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
    }
    response
}

/// Build the per-request context. Identity headers are supplied by the
/// upstream auth layer; absent values fall back to the anonymous
/// sentinels.
fn extract_context(headers: &HeaderMap, addr: SocketAddr) -> SecurityContext {
    let principal = header_str(headers, "x-principal-id").unwrap_or(ANONYMOUS_PRINCIPAL);
    let session = header_str(headers, "x-session-id").unwrap_or(NO_SESSION);

    // First hop of x-forwarded-for wins; fall back to the socket peer.
    let origin = header_str(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| addr.ip().to_string());

    let client_signature = header_str(headers, header::USER_AGENT.as_str())
        .unwrap_or_default()
        .to_string();

    let mut ctx = SecurityContext::new(principal, origin)
        .with_session(session)
        .with_client_signature(client_signature);

    if let Some(request_id) = header_str(headers, "x-request-id") {
        ctx.request_id = request_id.to_string();
    }
    if let Some(org) = header_str(headers, "x-organization-id") {
        ctx.organization = Some(org.to_string());
    }
    if let Some(roles) = header_str(headers, "x-roles") {
        ctx.roles = roles
            .split(',')
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();
    }
    ctx
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[test]
    fn test_defaults_without_identity_headers() {
        let ctx = extract_context(&HeaderMap::new(), addr());
        assert_eq!(ctx.principal, ANONYMOUS_PRINCIPAL);
        assert_eq!(ctx.session_id, NO_SESSION);
        assert_eq!(ctx.origin, "127.0.0.1");
    }

    #[test]
    fn test_forwarded_for_first_hop_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        headers.insert("x-principal-id", "alice".parse().unwrap());
        headers.insert("x-roles", "student, grader".parse().unwrap());

        let ctx = extract_context(&headers, addr());
        assert_eq!(ctx.origin, "203.0.113.7");
        assert_eq!(ctx.principal, "alice");
        assert_eq!(ctx.roles, vec!["student", "grader"]);
    }
}
