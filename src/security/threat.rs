//! Threat signature registry and matcher.
//!
//! Patterns are regex signatures evaluated in registration order; the
//! first match short-circuits. A signature that fails to compile is
//! logged and the pattern treated as inert — a bad operator update must
//! never take the matcher down with it.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

use crate::error::GatewayError;
use crate::security::context::{SecurityContext, SecurityEvent, Severity};

/// Operator-visible threat pattern definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatPattern {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Regular-expression signature tested against request fields.
    pub signature: String,
    pub severity: Severity,
    pub enabled: bool,
}

/// Partial update applied via the admin API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatternUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub signature: Option<String>,
    pub severity: Option<Severity>,
    pub enabled: Option<bool>,
}

/// Result of a successful scan.
#[derive(Debug, Clone)]
pub struct ThreatMatch {
    pub pattern_id: String,
    pub pattern_name: String,
    pub severity: Severity,
}

struct CompiledPattern {
    meta: ThreatPattern,
    /// `None` when the signature failed to compile (pattern is inert).
    regex: Option<Regex>,
}

impl CompiledPattern {
    fn compile(meta: ThreatPattern) -> Self {
        let regex = match Regex::new(&meta.signature) {
            Ok(r) => Some(r),
            Err(e) => {
                tracing::error!(
                    pattern = %meta.id,
                    error = %e,
                    "Threat signature failed to compile, pattern disabled"
                );
                None
            }
        };
        Self { meta, regex }
    }

    fn matches(&self, text: &str) -> bool {
        self.meta.enabled
            && self
                .regex
                .as_ref()
                .map(|r| r.is_match(text))
                .unwrap_or(false)
    }
}

/// Insertion-ordered registry of threat patterns.
pub struct PatternRegistry {
    patterns: RwLock<Vec<CompiledPattern>>,
}

impl PatternRegistry {
    pub fn new() -> Self {
        Self {
            patterns: RwLock::new(Vec::new()),
        }
    }

    /// Registry seeded with the built-in detector set.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        for pattern in default_patterns() {
            registry.insert(pattern);
        }
        registry
    }

    /// Register a pattern. A malformed signature is logged and leaves the
    /// pattern inert rather than rejecting it.
    pub fn insert(&self, pattern: ThreatPattern) {
        let mut patterns = self.patterns.write().expect("pattern registry poisoned");
        patterns.push(CompiledPattern::compile(pattern));
    }

    /// Apply an operator update. Unknown ids and uncompilable signatures
    /// are reported to the caller with no state change.
    pub fn update(&self, id: &str, update: PatternUpdate) -> Result<ThreatPattern, GatewayError> {
        let mut patterns = self.patterns.write().expect("pattern registry poisoned");
        let slot = patterns
            .iter_mut()
            .find(|p| p.meta.id == id)
            .ok_or_else(|| GatewayError::UnknownPattern(id.to_string()))?;

        let mut meta = slot.meta.clone();
        if let Some(name) = update.name {
            meta.name = name;
        }
        if let Some(description) = update.description {
            meta.description = description;
        }
        if let Some(severity) = update.severity {
            meta.severity = severity;
        }
        if let Some(enabled) = update.enabled {
            meta.enabled = enabled;
        }
        if let Some(signature) = update.signature {
            // Reject up front: an update must not silently neuter a detector.
            Regex::new(&signature)
                .map_err(|e| GatewayError::InvalidSignature(e.to_string()))?;
            meta.signature = signature;
        }

        *slot = CompiledPattern::compile(meta.clone());
        Ok(meta)
    }

    pub fn list(&self) -> Vec<ThreatPattern> {
        let patterns = self.patterns.read().expect("pattern registry poisoned");
        patterns.iter().map(|p| p.meta.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.patterns.read().expect("pattern registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Test `text` against every enabled pattern in registration order.
    pub fn scan(&self, text: &str) -> Option<ThreatMatch> {
        let patterns = self.patterns.read().expect("pattern registry poisoned");
        patterns.iter().find(|p| p.matches(text)).map(|p| ThreatMatch {
            pattern_id: p.meta.id.clone(),
            pattern_name: p.meta.name.clone(),
            severity: p.meta.severity,
        })
    }

    /// Scan the free-text fields of a request context.
    pub fn scan_context(&self, ctx: &SecurityContext) -> Option<ThreatMatch> {
        self.scan(&ctx.client_signature)
            .or_else(|| self.scan(&ctx.origin))
    }

    /// Scan an emitted event's description.
    pub fn scan_event(&self, event: &SecurityEvent) -> Option<ThreatMatch> {
        self.scan(&event.description)
    }

    /// Merge patterns from an intelligence feed, skipping ids already
    /// registered. Returns the number of patterns added.
    pub fn merge_feed(&self, feed: Vec<ThreatPattern>) -> usize {
        let mut patterns = self.patterns.write().expect("pattern registry poisoned");
        let mut added = 0;
        for pattern in feed {
            if patterns.iter().any(|p| p.meta.id == pattern.id) {
                continue;
            }
            patterns.push(CompiledPattern::compile(pattern));
            added += 1;
        }
        added
    }
}

impl Default for PatternRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Built-in detector set covering the attack shapes seen in request
/// identifiers and client signatures.
pub fn default_patterns() -> Vec<ThreatPattern> {
    vec![
        ThreatPattern {
            id: "sql-injection".to_string(),
            name: "SQL injection".to_string(),
            description: "Injection keywords in request identifiers".to_string(),
            signature: r"(?i)(\bunion\b[\s\S]+\bselect\b|\bselect\b.+\bfrom\b|\binsert\b.+\binto\b|\bdrop\b.+\btable\b|'\s*or\s+'?1'?\s*=\s*'?1)".to_string(),
            severity: Severity::High,
            enabled: true,
        },
        ThreatPattern {
            id: "script-injection".to_string(),
            name: "Script injection".to_string(),
            description: "Embedded script or event-handler markup".to_string(),
            signature: r"(?i)(<script\b|javascript:|\bon(error|load|click|mouseover)\s*=)".to_string(),
            severity: Severity::High,
            enabled: true,
        },
        ThreatPattern {
            id: "path-traversal".to_string(),
            name: "Path traversal".to_string(),
            description: "Directory escape sequences".to_string(),
            signature: r"(?i)(\.\./|\.\.\\|%2e%2e%2f|%2e%2e/)".to_string(),
            severity: Severity::Medium,
            enabled: true,
        },
        ThreatPattern {
            id: "command-injection".to_string(),
            name: "Command injection".to_string(),
            description: "Shell metacharacters followed by common binaries".to_string(),
            signature: r"(?i)([;&|`]\s*(cat|ls|rm|wget|curl|bash|sh|nc|powershell)\b|\$\()".to_string(),
            severity: Severity::Critical,
            enabled: true,
        },
        ThreatPattern {
            id: "repeated-auth-failure".to_string(),
            name: "Repeated authentication failures".to_string(),
            description: "Brute-force signal in emitted event text".to_string(),
            signature: r"(?i)(repeated authentication failures|authentication failure threshold|brute[- ]force)".to_string(),
            severity: Severity::High,
            enabled: true,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_set_matches_traversal() {
        let registry = PatternRegistry::with_defaults();
        let hit = registry.scan("Mozilla/5.0 ../../etc/passwd").expect("should match");
        assert_eq!(hit.pattern_id, "path-traversal");
    }

    #[test]
    fn test_first_match_short_circuits() {
        let registry = PatternRegistry::new();
        registry.insert(ThreatPattern {
            id: "first".into(),
            name: "First".into(),
            description: String::new(),
            signature: "abc".into(),
            severity: Severity::Low,
            enabled: true,
        });
        registry.insert(ThreatPattern {
            id: "second".into(),
            name: "Second".into(),
            description: String::new(),
            signature: "abc".into(),
            severity: Severity::High,
            enabled: true,
        });

        let hit = registry.scan("xxabcxx").unwrap();
        assert_eq!(hit.pattern_id, "first");
    }

    #[test]
    fn test_malformed_signature_is_inert() {
        let registry = PatternRegistry::new();
        registry.insert(ThreatPattern {
            id: "broken".into(),
            name: "Broken".into(),
            description: String::new(),
            signature: "([unclosed".into(),
            severity: Severity::High,
            enabled: true,
        });

        assert!(registry.scan("([unclosed").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_disabled_pattern_skipped() {
        let registry = PatternRegistry::with_defaults();
        registry
            .update("path-traversal", PatternUpdate {
                enabled: Some(false),
                ..Default::default()
            })
            .unwrap();

        assert!(registry.scan("../..").is_none());
    }

    #[test]
    fn test_update_rejects_bad_signature() {
        let registry = PatternRegistry::with_defaults();
        let err = registry.update("sql-injection", PatternUpdate {
            signature: Some("([".into()),
            ..Default::default()
        });
        assert!(matches!(err, Err(GatewayError::InvalidSignature(_))));

        // Original signature still active.
        assert!(registry.scan("' OR 1=1").is_some());
    }

    #[test]
    fn test_update_unknown_id() {
        let registry = PatternRegistry::with_defaults();
        let err = registry.update("nope", PatternUpdate::default());
        assert!(matches!(err, Err(GatewayError::UnknownPattern(_))));
    }

    #[test]
    fn test_scan_context_covers_signature_and_origin() {
        let registry = PatternRegistry::with_defaults();
        let ctx = SecurityContext::new("alice", "10.0.0.1")
            .with_client_signature("curl <script>alert(1)</script>");
        assert!(registry.scan_context(&ctx).is_some());
    }

    #[test]
    fn test_merge_feed_skips_known_ids() {
        let registry = PatternRegistry::with_defaults();
        let before = registry.len();

        let added = registry.merge_feed(vec![
            ThreatPattern {
                id: "path-traversal".into(),
                name: "dup".into(),
                description: String::new(),
                signature: "x".into(),
                severity: Severity::Low,
                enabled: true,
            },
            ThreatPattern {
                id: "feed-extra".into(),
                name: "Feed extra".into(),
                description: String::new(),
                signature: "evil-scanner".into(),
                severity: Severity::Medium,
                enabled: true,
            },
        ]);

        assert_eq!(added, 1);
        assert_eq!(registry.len(), before + 1);
        assert!(registry.scan("evil-scanner/1.0").is_some());
    }
}
