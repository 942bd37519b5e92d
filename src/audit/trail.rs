//! Audit trail: fire-and-forget ingestion in front of the store.
//!
//! `record` must never block or fail the request path: entries are
//! redacted, pushed onto an unbounded channel, and written by a
//! background task. Sink failures are logged and swallowed — audit
//! unavailability is an observability problem, not a request outcome.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::audit::entry::{AuditFilter, AuditLogEntry, AuditStatistics, ExportFormat};
use crate::audit::redact::redact_map;
use crate::audit::store::AuditStore;
use crate::error::GatewayError;
use crate::observability::metrics;
use crate::security::context::SecurityEvent;

#[derive(Clone)]
pub struct AuditTrail {
    store: Arc<dyn AuditStore>,
    tx: mpsc::UnboundedSender<AuditLogEntry>,
}

impl AuditTrail {
    /// Create the trail and spawn its writer task. Requires a running
    /// Tokio runtime.
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<AuditLogEntry>();

        let writer_store = store.clone();
        tokio::spawn(async move {
            while let Some(entry) = rx.recv().await {
                if let Err(e) = writer_store.append(entry) {
                    tracing::warn!(error = %e, "Audit append failed, entry dropped");
                }
            }
            tracing::debug!("Audit writer stopped");
        });

        Self { store, tx }
    }

    /// Persist an event. Infallible from the caller's perspective.
    pub fn record(&self, event: &SecurityEvent) {
        self.append_entry(AuditLogEntry::from_event(event));
    }

    /// Persist a pre-built entry after redaction.
    pub fn append_entry(&self, mut entry: AuditLogEntry) {
        redact_map(&mut entry.details);
        redact_map(&mut entry.metadata);
        metrics::record_audit_event(&entry.action);
        if self.tx.send(entry).is_err() {
            tracing::warn!("Audit writer gone, entry dropped");
        }
    }

    pub fn query(&self, filter: &AuditFilter) -> (Vec<AuditLogEntry>, usize) {
        self.store.query(filter)
    }

    pub fn statistics(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> AuditStatistics {
        self.store.statistics(from, to)
    }

    pub fn purge(&self, older_than: DateTime<Utc>) -> usize {
        let removed = self.store.purge(older_than);
        if removed > 0 {
            tracing::info!(removed, "Audit retention purge");
        }
        removed
    }

    /// Serialize the filtered entries in the requested format.
    pub fn export(&self, filter: &AuditFilter, format: ExportFormat) -> Result<String, GatewayError> {
        let (entries, _) = self.store.query(filter);
        match format {
            ExportFormat::Json => Ok(serde_json::to_string_pretty(&entries)?),
            ExportFormat::Csv => Ok(to_csv(&entries)),
        }
    }

    /// The trail is healthy while its writer task is consuming.
    pub fn is_healthy(&self) -> bool {
        !self.tx.is_closed()
    }
}

fn to_csv(entries: &[AuditLogEntry]) -> String {
    let mut out = String::from(
        "id,principal,session_id,action,resource,origin,client_signature,timestamp,success,details,metadata\n",
    );
    for e in entries {
        let row = [
            e.id.as_str(),
            e.principal.as_str(),
            e.session_id.as_str(),
            e.action.as_str(),
            e.resource.as_str(),
            e.origin.as_str(),
            e.client_signature.as_str(),
            &e.timestamp.to_rfc3339(),
            if e.success { "true" } else { "false" },
            &serde_json::to_string(&e.details).unwrap_or_default(),
            &serde_json::to_string(&e.metadata).unwrap_or_default(),
        ]
        .iter()
        .map(|field| csv_escape(field))
        .collect::<Vec<_>>()
        .join(",");
        out.push_str(&row);
        out.push('\n');
    }
    out
}

fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::store::MemoryAuditStore;
    use crate::security::context::{EventCategory, SecurityContext, Severity};
    use std::time::Duration;

    fn trail() -> (AuditTrail, Arc<MemoryAuditStore>) {
        let store = Arc::new(MemoryAuditStore::default());
        (AuditTrail::new(store.clone()), store)
    }

    async fn drain() {
        // Writer task runs on the same runtime; yield long enough for it
        // to consume the channel.
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_record_reaches_store() {
        let (trail, store) = trail();
        let ctx = SecurityContext::new("alice", "1.1.1.1");
        trail.record(&SecurityEvent::new(
            EventCategory::Authorization,
            Severity::Medium,
            "policy monitor fired",
            ctx,
        ));
        drain().await;

        assert_eq!(store.len(), 1);
        let (entries, _) = trail.query(&AuditFilter::default());
        assert_eq!(entries[0].action, "authorization");
        assert!(entries[0].success);
    }

    #[tokio::test]
    async fn test_sensitive_details_never_stored() {
        let (trail, _store) = trail();
        let ctx = SecurityContext::new("alice", "1.1.1.1");
        let event = SecurityEvent::new(
            EventCategory::DataAccess,
            Severity::Low,
            "profile update",
            ctx,
        )
        .with_metadata("password", "hunter2")
        .with_metadata("field", "email");
        trail.record(&event);
        drain().await;

        let (entries, _) = trail.query(&AuditFilter::default());
        assert_eq!(entries[0].metadata["password"], "[REDACTED]");
        assert_eq!(entries[0].metadata["field"], "email");

        let json = trail.export(&AuditFilter::default(), ExportFormat::Json).unwrap();
        assert!(!json.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_threat_event_recorded_as_failure() {
        let (trail, _store) = trail();
        let ctx = SecurityContext::new("mallory", "6.6.6.6");
        trail.record(&SecurityEvent::new(
            EventCategory::ThreatDetected,
            Severity::High,
            "path traversal in client signature",
            ctx,
        ));
        drain().await;

        let (entries, _) = trail.query(&AuditFilter::default());
        assert!(!entries[0].success);
    }

    #[tokio::test]
    async fn test_csv_export_shape() {
        let (trail, _store) = trail();
        let ctx = SecurityContext::new("alice", "1.1.1.1")
            .with_client_signature("agent \"quoted\", v1");
        trail.record(&SecurityEvent::new(
            EventCategory::DataAccess,
            Severity::Low,
            "read",
            ctx,
        ));
        drain().await;

        let csv = trail.export(&AuditFilter::default(), ExportFormat::Csv).unwrap();
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("id,principal,"));
        let row = lines.next().unwrap();
        assert!(row.contains("alice"));
        // Embedded quotes doubled per RFC 4180.
        assert!(row.contains("\"agent \"\"quoted\"\", v1\""));
    }
}
