//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! gateway. All types derive Serde traits for deserialization from
//! config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the security gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, timeouts).
    pub listener: ListenerConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Behavioral anomaly scoring configuration.
    pub anomaly: AnomalyConfig,

    /// Authentication failure accounting.
    pub auth_failures: AuthFailureConfig,

    /// Active session tracking.
    pub sessions: SessionConfig,

    /// Background sweep intervals.
    pub sweeps: SweepConfig,

    /// Threat intelligence feed.
    pub threat_intel: ThreatIntelConfig,

    /// Audit trail settings.
    pub audit: AuditConfig,

    /// Admin API settings.
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Window length in milliseconds.
    pub window_ms: u64,

    /// Maximum requests per key within a window. 0 denies everything.
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
            max_requests: 100,
        }
    }
}

/// Behavioral anomaly scoring configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Deviation above this is treated as a positive threat signal.
    pub high_risk_threshold: f64,

    /// Fingerprints retained per principal.
    pub max_history: usize,

    /// Profiles idle longer than this are expired by the sweep.
    pub profile_max_age_hours: u64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            high_risk_threshold: 0.8,
            max_history: 200,
            profile_max_age_hours: 720,
        }
    }
}

/// Authentication failure accounting.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthFailureConfig {
    /// Failures within the window that trip the brute-force response.
    pub threshold: u32,

    /// Counting window in seconds.
    pub window_secs: u64,

    /// How long the maintenance sweep blocks an offending origin.
    pub block_duration_secs: u64,
}

impl Default for AuthFailureConfig {
    fn default() -> Self {
        Self {
            threshold: 5,
            window_secs: 600,
            block_duration_secs: 1800,
        }
    }
}

/// Active session tracking.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Sessions idle longer than this are reaped.
    pub idle_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 3600,
        }
    }
}

/// Background sweep intervals. Maintenance paths, not correctness paths:
/// a skipped or delayed tick loses nothing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Suspicious-activity / table-GC sweep interval in seconds.
    pub maintenance_secs: u64,

    /// Session reaper interval in seconds.
    pub session_reap_secs: u64,

    /// Threat-intel refresh interval in seconds.
    pub intel_refresh_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            maintenance_secs: 30,
            session_reap_secs: 300,
            intel_refresh_secs: 3600,
        }
    }
}

/// Threat intelligence feed.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ThreatIntelConfig {
    /// Feed URL returning a JSON array of threat patterns. Empty
    /// disables the refresh task.
    pub feed_url: String,

    /// Fetch timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ThreatIntelConfig {
    fn default() -> Self {
        Self {
            feed_url: String::new(),
            timeout_secs: 10,
        }
    }
}

/// Audit trail settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Retention horizon in days (compliance-driven multi-year default).
    pub retention_days: i64,

    /// In-memory store capacity.
    pub max_entries: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            retention_days: 2555,
            max_entries: 100_000,
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin router.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON logs instead of the pretty format.
    pub log_json: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_json: false,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
