//! Storage-agnostic audit repository and the in-memory implementation.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::audit::entry::{AuditFilter, AuditLogEntry, AuditStatistics};

#[derive(Debug, Error)]
pub enum AuditStoreError {
    #[error("audit store unavailable: {0}")]
    Unavailable(String),
}

/// Repository contract: append, filtered query, aggregate, purge.
/// Persistence technology is an implementation detail behind this seam.
pub trait AuditStore: Send + Sync {
    fn append(&self, entry: AuditLogEntry) -> Result<(), AuditStoreError>;

    /// Matching entries most-recent-first with limit/offset pagination,
    /// plus the total match count before pagination.
    fn query(&self, filter: &AuditFilter) -> (Vec<AuditLogEntry>, usize);

    fn statistics(&self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>)
        -> AuditStatistics;

    /// Remove entries older than `older_than`. Returns entries removed.
    fn purge(&self, older_than: DateTime<Utc>) -> usize;
}

/// Append-ordered in-memory store, bounded to `max_entries` (oldest
/// dropped beyond the cap).
pub struct MemoryAuditStore {
    entries: RwLock<Vec<AuditLogEntry>>,
    max_entries: usize,
}

impl MemoryAuditStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            max_entries: max_entries.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("audit store poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryAuditStore {
    fn default() -> Self {
        Self::new(100_000)
    }
}

impl AuditStore for MemoryAuditStore {
    fn append(&self, entry: AuditLogEntry) -> Result<(), AuditStoreError> {
        let mut entries = self.entries.write().expect("audit store poisoned");
        if entries.len() >= self.max_entries {
            let excess = entries.len() + 1 - self.max_entries;
            entries.drain(..excess);
        }
        entries.push(entry);
        Ok(())
    }

    fn query(&self, filter: &AuditFilter) -> (Vec<AuditLogEntry>, usize) {
        let entries = self.entries.read().expect("audit store poisoned");
        // Append order is chronological, so reverse iteration yields
        // most-recent-first without a sort.
        let matched: Vec<&AuditLogEntry> =
            entries.iter().rev().filter(|e| filter.matches(e)).collect();
        let total = matched.len();

        let page = matched
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit)
            .cloned()
            .collect();
        (page, total)
    }

    fn statistics(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> AuditStatistics {
        let entries = self.entries.read().expect("audit store poisoned");
        let mut stats = AuditStatistics::default();

        for entry in entries.iter() {
            if let Some(from) = from {
                if entry.timestamp < from {
                    continue;
                }
            }
            if let Some(to) = to {
                if entry.timestamp > to {
                    continue;
                }
            }
            stats.total += 1;
            if entry.success {
                stats.success_count += 1;
            } else {
                stats.failure_count += 1;
            }
            *stats.by_action.entry(entry.action.clone()).or_insert(0) += 1;
            *stats.by_resource.entry(entry.resource.clone()).or_insert(0) += 1;
        }
        stats
    }

    fn purge(&self, older_than: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().expect("audit store poisoned");
        let before = entries.len();
        entries.retain(|e| e.timestamp >= older_than);
        before - entries.len()
    }
}
