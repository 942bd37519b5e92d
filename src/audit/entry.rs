//! Durable audit record types and query shapes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::security::context::{EventCategory, SecurityEvent, Severity};

/// Append-only audit record. Never mutated after creation; removed only
/// by the retention sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: String,
    pub principal: String,
    pub session_id: String,
    pub action: String,
    pub resource: String,
    pub origin: String,
    pub client_signature: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    #[serde(default)]
    pub details: BTreeMap<String, String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl AuditLogEntry {
    /// Derive an entry from an emitted pipeline event.
    pub fn from_event(event: &SecurityEvent) -> Self {
        let mut details = BTreeMap::new();
        details.insert("description".to_string(), event.description.clone());
        details.insert("severity".to_string(), event.severity.as_str().to_string());
        details.insert("request_id".to_string(), event.context.request_id.clone());

        let resource = event
            .metadata
            .get("resource")
            .cloned()
            .unwrap_or_else(|| "security-pipeline".to_string());

        Self {
            id: Uuid::new_v4().to_string(),
            principal: event.context.principal.clone(),
            session_id: event.context.session_id.clone(),
            action: event.category.as_str().to_string(),
            resource,
            origin: event.context.origin.clone(),
            client_signature: event.context.client_signature.clone(),
            timestamp: Utc::now(),
            success: event_success(event.category, event.severity),
            details,
            metadata: event.metadata.clone(),
        }
    }
}

/// High-severity and threat events record as failures; routine decisions
/// record as successes.
fn event_success(category: EventCategory, severity: Severity) -> bool {
    category != EventCategory::ThreatDetected && severity <= Severity::Medium
}

/// Query filter: all fields optional, results most-recent-first.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditFilter {
    pub principal: Option<String>,
    pub action: Option<String>,
    pub resource: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

impl Default for AuditFilter {
    fn default() -> Self {
        Self {
            principal: None,
            action: None,
            resource: None,
            from: None,
            to: None,
            limit: default_limit(),
            offset: 0,
        }
    }
}

impl AuditFilter {
    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        if let Some(principal) = &self.principal {
            if &entry.principal != principal {
                return false;
            }
        }
        if let Some(action) = &self.action {
            if &entry.action != action {
                return false;
            }
        }
        if let Some(resource) = &self.resource {
            if &entry.resource != resource {
                return false;
            }
        }
        if let Some(from) = self.from {
            if entry.timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if entry.timestamp > to {
                return false;
            }
        }
        true
    }
}

/// Aggregate statistics over a time range.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditStatistics {
    pub total: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub by_action: BTreeMap<String, u64>,
    pub by_resource: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            ExportFormat::Json => "audit-logs.json",
            ExportFormat::Csv => "audit-logs.csv",
        }
    }
}
