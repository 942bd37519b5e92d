//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_validations_total` (counter): requests by outcome
//! - `gateway_rate_limited_total` (counter): limiter rejections
//! - `gateway_threat_matches_total` (counter): signature hits by pattern
//! - `gateway_policy_actions_total` (counter): rule firings by action
//! - `gateway_audit_events_total` (counter): audit appends by action
//! - `gateway_active_sessions` (gauge), `gateway_blocked_origins` (gauge)

use std::net::SocketAddr;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on the given address.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => {
            describe_counter!(
                "gateway_validations_total",
                "Validation pipeline outcomes by terminal stage"
            );
            describe_counter!("gateway_rate_limited_total", "Rate limiter rejections");
            describe_counter!(
                "gateway_threat_matches_total",
                "Threat signature matches by pattern"
            );
            describe_counter!(
                "gateway_policy_actions_total",
                "Policy rule firings by action"
            );
            describe_counter!("gateway_audit_events_total", "Audit trail appends by action");
            describe_gauge!("gateway_active_sessions", "Sessions currently tracked");
            describe_gauge!("gateway_blocked_origins", "Origins currently blocked");
            tracing::info!(address = %addr, "Metrics exporter listening");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install metrics exporter");
        }
    }
}

pub fn record_validation(outcome: &'static str) {
    counter!("gateway_validations_total", "outcome" => outcome).increment(1);
}

pub fn record_rate_limited() {
    counter!("gateway_rate_limited_total").increment(1);
}

pub fn record_threat_match(pattern: &str) {
    counter!("gateway_threat_matches_total", "pattern" => pattern.to_string()).increment(1);
}

pub fn record_policy_action(action: &'static str) {
    counter!("gateway_policy_actions_total", "action" => action).increment(1);
}

pub fn record_audit_event(action: &str) {
    counter!("gateway_audit_events_total", "action" => action.to_string()).increment(1);
}

pub fn record_gauges(active_sessions: usize, blocked_origins: usize) {
    gauge!("gateway_active_sessions").set(active_sessions as f64);
    gauge!("gateway_blocked_origins").set(blocked_origins as f64);
}
