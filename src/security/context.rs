//! Per-request security context and event records.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Principal sentinel for unauthenticated requests.
pub const ANONYMOUS_PRINCIPAL: &str = "anonymous";

/// Session sentinel for requests without a session.
pub const NO_SESSION: &str = "no-session";

/// Current wall-clock time as epoch milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Identity and provenance bundle consumed by every pipeline stage.
///
/// Constructed once per request by the HTTP middleware; `principal` and
/// `origin` are always non-empty (sentinels substitute for absent values).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityContext {
    pub principal: String,
    pub session_id: String,
    pub origin: String,
    pub client_signature: String,
    pub timestamp_ms: u64,
    pub request_id: String,
    pub organization: Option<String>,
    pub roles: Vec<String>,
}

impl SecurityContext {
    pub fn new(principal: impl Into<String>, origin: impl Into<String>) -> Self {
        let principal = non_empty(principal.into(), ANONYMOUS_PRINCIPAL);
        let origin = non_empty(origin.into(), "unknown");
        Self {
            principal,
            session_id: NO_SESSION.to_string(),
            origin,
            client_signature: String::new(),
            timestamp_ms: now_millis(),
            request_id: Uuid::new_v4().to_string(),
            organization: None,
            roles: Vec::new(),
        }
    }

    pub fn anonymous(origin: impl Into<String>) -> Self {
        Self::new(ANONYMOUS_PRINCIPAL, origin)
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = non_empty(session_id.into(), NO_SESSION);
        self
    }

    pub fn with_client_signature(mut self, signature: impl Into<String>) -> Self {
        self.client_signature = signature.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }

    pub fn is_anonymous(&self) -> bool {
        self.principal == ANONYMOUS_PRINCIPAL
    }

    /// Composite key used for per-principal-per-origin accounting.
    pub fn rate_key(&self) -> String {
        format!("{}|{}", self.principal, self.origin)
    }
}

fn non_empty(value: String, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

/// Classification of a security-relevant decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Authentication,
    Authorization,
    DataAccess,
    CodeExecution,
    ThreatDetected,
}

impl EventCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Authentication => "authentication",
            EventCategory::Authorization => "authorization",
            EventCategory::DataAccess => "data_access",
            EventCategory::CodeExecution => "code_execution",
            EventCategory::ThreatDetected => "threat_detected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// Immutable record of a consequential decision, consumed exactly once by
/// the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub category: EventCategory,
    pub severity: Severity,
    pub description: String,
    pub context: SecurityContext,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl SecurityEvent {
    pub fn new(
        category: EventCategory,
        severity: Severity,
        description: impl Into<String>,
        context: SecurityContext,
    ) -> Self {
        Self {
            category,
            severity,
            description: description.into(),
            context,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
