//! Validation orchestrator: the pipeline entry point.
//!
//! Walks each request through
//! `blocked-check → rate-limit → threat-scan → anomaly → policy`; the
//! first definitive deny short-circuits the rest. Denials are typed
//! verdicts, never errors. All shared tables live here, owned by one
//! long-lived gateway instance constructed at startup.

use arc_swap::ArcSwap;
use dashmap::DashMap;
use std::sync::Arc;

use crate::audit::AuditTrail;
use crate::config::schema::GatewayConfig;
use crate::observability::metrics;
use crate::security::anomaly::AnomalyScorer;
use crate::security::context::{
    now_millis, EventCategory, SecurityContext, SecurityEvent, Severity, NO_SESSION,
};
use crate::security::policy::{PolicyEngine, RuleAction, RuleSignals};
use crate::security::rate_limit::RateLimiter;
use crate::security::threat::PatternRegistry;

/// Hot-reloadable knobs snapshot. Swapped atomically on config reload.
#[derive(Debug, Clone)]
pub struct Tunables {
    pub rate_window_ms: u64,
    pub rate_max_requests: u32,
    pub high_risk_threshold: f64,
    pub auth_failure_threshold: u32,
    pub auth_failure_window_ms: u64,
    pub auth_block_duration_ms: u64,
    pub session_idle_timeout_ms: u64,
    pub profile_max_age_ms: u64,
}

impl From<&GatewayConfig> for Tunables {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            rate_window_ms: config.rate_limit.window_ms,
            rate_max_requests: config.rate_limit.max_requests,
            high_risk_threshold: config.anomaly.high_risk_threshold,
            auth_failure_threshold: config.auth_failures.threshold,
            auth_failure_window_ms: config.auth_failures.window_secs * 1000,
            auth_block_duration_ms: config.auth_failures.block_duration_secs * 1000,
            session_idle_timeout_ms: config.sessions.idle_timeout_secs * 1000,
            profile_max_age_ms: config.anomaly.profile_max_age_hours * 3_600_000,
        }
    }
}

/// Terminal outcome of a validation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub allowed: bool,
    /// 403 or 429 when denied; 0 when allowed.
    pub status: u16,
    pub retry_after_secs: Option<u64>,
    pub message: String,
}

impl Verdict {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            status: 0,
            retry_after_secs: None,
            message: String::new(),
        }
    }

    pub fn deny(message: impl Into<String>) -> Self {
        Self {
            allowed: false,
            status: 403,
            retry_after_secs: None,
            message: message.into(),
        }
    }

    pub fn rate_limited(retry_after_secs: u64) -> Self {
        Self {
            allowed: false,
            status: 429,
            retry_after_secs: Some(retry_after_secs),
            message: "rate limit exceeded".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct BlockedOrigin {
    reason: String,
    /// `None` blocks until explicit removal.
    expires_at_ms: Option<u64>,
}

#[derive(Debug, Clone)]
struct SessionEntry {
    principal: String,
    origin: String,
    last_seen_ms: u64,
}

#[derive(Debug, Clone, Copy)]
struct FailureWindow {
    count: u32,
    window_start_ms: u64,
}

/// Gauge snapshot served by the admin metrics endpoint.
#[derive(Debug, Clone, serde::Serialize)]
pub struct GatewaySnapshot {
    pub active_sessions: usize,
    pub blocked_origins: usize,
    pub policies: usize,
    pub threat_patterns: usize,
    pub behavior_profiles: usize,
    pub tracked_rate_keys: usize,
}

/// The long-lived pipeline instance. Owns every shared table; handed
/// around by `Arc`.
pub struct SecurityGateway {
    tunables: ArcSwap<Tunables>,
    limiter: RateLimiter,
    patterns: PatternRegistry,
    scorer: AnomalyScorer,
    engine: PolicyEngine,
    audit: AuditTrail,
    blocked: DashMap<String, BlockedOrigin>,
    sessions: DashMap<String, SessionEntry>,
    /// Keyed like the rate limiter: `principal|origin`.
    auth_failures: DashMap<String, FailureWindow>,
}

impl SecurityGateway {
    pub fn new(config: &GatewayConfig, audit: AuditTrail) -> Self {
        Self {
            tunables: ArcSwap::from_pointee(Tunables::from(config)),
            limiter: RateLimiter::new(),
            patterns: PatternRegistry::with_defaults(),
            scorer: AnomalyScorer::new(config.anomaly.max_history),
            engine: PolicyEngine::with_defaults(),
            audit,
            blocked: DashMap::new(),
            sessions: DashMap::new(),
            auth_failures: DashMap::new(),
        }
    }

    /// Swap in tunables from a reloaded configuration.
    pub fn apply_config(&self, config: &GatewayConfig) {
        self.tunables.store(Arc::new(Tunables::from(config)));
        tracing::info!("Gateway tunables updated");
    }

    /// Validate one request. Synchronous and bounded: the only I/O on
    /// this path is the fire-and-forget audit append.
    pub fn validate(&self, ctx: &SecurityContext) -> Verdict {
        let t = self.tunables.load();
        let now = ctx.timestamp_ms;

        // Stage 1: blocked origin.
        if self.is_blocked(&ctx.origin, now) {
            self.emit(SecurityEvent::new(
                EventCategory::Authorization,
                Severity::High,
                format!("request from blocked origin {}", ctx.origin),
                ctx.clone(),
            ));
            metrics::record_validation("blocked_origin");
            tracing::warn!(origin = %ctx.origin, principal = %ctx.principal, "Blocked origin rejected");
            return Verdict::deny("origin is blocked");
        }

        // Stage 2: rate limit.
        let rate = self.limiter.check_at(
            &ctx.rate_key(),
            t.rate_window_ms,
            t.rate_max_requests,
            now,
        );
        if !rate.allowed {
            self.emit(
                SecurityEvent::new(
                    EventCategory::Authorization,
                    Severity::Medium,
                    format!("rate limit exceeded for {}", ctx.rate_key()),
                    ctx.clone(),
                )
                .with_metadata("retry_after_secs", rate.retry_after_secs.to_string()),
            );
            metrics::record_validation("rate_limited");
            metrics::record_rate_limited();
            tracing::warn!(key = %ctx.rate_key(), retry_after = rate.retry_after_secs, "Rate limit exceeded");
            return Verdict::rate_limited(rate.retry_after_secs);
        }

        // Stage 3: threat signatures.
        if let Some(hit) = self.patterns.scan_context(ctx) {
            self.emit(
                SecurityEvent::new(
                    EventCategory::ThreatDetected,
                    hit.severity,
                    format!("threat pattern {} matched request fields", hit.pattern_name),
                    ctx.clone(),
                )
                .with_metadata("pattern_id", hit.pattern_id.clone()),
            );
            metrics::record_validation("threat_match");
            metrics::record_threat_match(&hit.pattern_id);
            tracing::warn!(pattern = %hit.pattern_id, principal = %ctx.principal, "Threat signature matched");
            return Verdict::deny("request matched a threat signature");
        }

        // Stage 4: behavioral anomaly. High deviation is a threat
        // signal; whether it denies is the policy engine's call.
        let deviation = self.scorer.score(ctx);
        if deviation > t.high_risk_threshold {
            self.emit(
                SecurityEvent::new(
                    EventCategory::ThreatDetected,
                    Severity::High,
                    format!("behavioral deviation {:.2} above threshold", deviation),
                    ctx.clone(),
                )
                .with_metadata("deviation", format!("{:.4}", deviation)),
            );
        }

        // Stage 5: policy evaluation.
        let signals = RuleSignals {
            rate,
            deviation,
            auth_failures: self.auth_failure_count(&ctx.rate_key(), now),
        };
        let decision = self.engine.evaluate(ctx, &signals);

        for flagged in &decision.flagged {
            let action = match flagged.action {
                RuleAction::Alert => "alert",
                _ => "monitor",
            };
            metrics::record_policy_action(action);
            self.emit(
                SecurityEvent::new(
                    EventCategory::Authorization,
                    flagged.action.severity(),
                    format!("policy rule {} flagged request", flagged.rule_name),
                    ctx.clone(),
                )
                .with_metadata("policy_id", flagged.policy_id.clone())
                .with_metadata("rule_id", flagged.rule_id.clone()),
            );
        }

        if !decision.allowed {
            let rule = decision
                .matched
                .map(|m| m.rule_name)
                .unwrap_or_else(|| "unknown".to_string());
            self.emit(SecurityEvent::new(
                EventCategory::Authorization,
                Severity::High,
                format!("request denied by policy rule {}", rule),
                ctx.clone(),
            ));
            metrics::record_validation("policy_denied");
            metrics::record_policy_action("deny");
            tracing::warn!(rule = %rule, principal = %ctx.principal, "Policy denied request");
            return Verdict::deny("denied by security policy");
        }

        self.touch_session(ctx);
        metrics::record_validation("allowed");
        Verdict::allow()
    }

    /// Event-emission interface for collaborating components.
    ///
    /// Beyond the audit append, emitted events feed back into detection:
    /// authentication failures advance the per-key failure window, and
    /// event text is scanned against the registry so detectors like
    /// repeated-auth-failure can fire on emitted descriptions.
    pub fn record(&self, event: SecurityEvent) {
        if event.category == EventCategory::Authentication && event.severity >= Severity::Medium {
            self.note_auth_failure(&event.context);
        }

        if event.category != EventCategory::ThreatDetected {
            if let Some(hit) = self.patterns.scan_event(&event) {
                metrics::record_threat_match(&hit.pattern_id);
                self.emit(
                    SecurityEvent::new(
                        EventCategory::ThreatDetected,
                        hit.severity,
                        format!("threat pattern {} matched event text", hit.pattern_name),
                        event.context.clone(),
                    )
                    .with_metadata("pattern_id", hit.pattern_id),
                );
            }
        }

        self.emit(event);
    }

    fn emit(&self, event: SecurityEvent) {
        self.audit.record(&event);
    }

    fn note_auth_failure(&self, ctx: &SecurityContext) {
        let t = self.tunables.load();
        let now = ctx.timestamp_ms;
        let key = ctx.rate_key();

        let mut window = self.auth_failures.entry(key.clone()).or_insert(FailureWindow {
            count: 0,
            window_start_ms: now,
        });
        if now.saturating_sub(window.window_start_ms) > t.auth_failure_window_ms {
            window.count = 0;
            window.window_start_ms = now;
        }
        window.count += 1;
        let count = window.count;
        drop(window);

        // Emit the brute-force signal once, at the crossing.
        if count == t.auth_failure_threshold {
            tracing::warn!(key = %key, count, "Repeated authentication failures");
            self.emit(
                SecurityEvent::new(
                    EventCategory::ThreatDetected,
                    Severity::High,
                    format!("repeated authentication failures from {}", key),
                    ctx.clone(),
                )
                .with_metadata("failure_count", count.to_string()),
            );
        }
    }

    pub fn auth_failure_count(&self, key: &str, now_ms: u64) -> u32 {
        let t = self.tunables.load();
        self.auth_failures
            .get(key)
            .filter(|w| now_ms.saturating_sub(w.window_start_ms) <= t.auth_failure_window_ms)
            .map(|w| w.count)
            .unwrap_or(0)
    }

    /// Add an origin to the blocked set and emit a high-severity event.
    /// `duration_ms = None` blocks until explicit removal.
    pub fn block_origin(&self, origin: &str, reason: &str, duration_ms: Option<u64>) {
        let now = now_millis();
        self.blocked.insert(
            origin.to_string(),
            BlockedOrigin {
                reason: reason.to_string(),
                expires_at_ms: duration_ms.map(|d| now + d),
            },
        );
        tracing::warn!(origin, reason, ?duration_ms, "Origin blocked");
        self.emit(
            SecurityEvent::new(
                EventCategory::ThreatDetected,
                Severity::High,
                format!("origin {} blocked: {}", origin, reason),
                SecurityContext::anonymous(origin),
            )
            .with_metadata("reason", reason.to_string()),
        );
    }

    pub fn unblock_origin(&self, origin: &str) -> bool {
        self.blocked.remove(origin).is_some()
    }

    /// Expiry is enforced lazily here; the maintenance sweep clears
    /// expired entries that were never looked up again.
    pub fn is_blocked(&self, origin: &str, now_ms: u64) -> bool {
        let expired = match self.blocked.get(origin) {
            None => return false,
            Some(entry) => match entry.expires_at_ms {
                Some(expires) => now_ms >= expires,
                None => return true,
            },
        };
        if expired {
            self.blocked.remove(origin);
            false
        } else {
            true
        }
    }

    pub fn blocked_reason(&self, origin: &str) -> Option<String> {
        self.blocked.get(origin).map(|b| b.reason.clone())
    }

    fn touch_session(&self, ctx: &SecurityContext) {
        if ctx.session_id == NO_SESSION {
            return;
        }
        self.sessions.insert(
            ctx.session_id.clone(),
            SessionEntry {
                principal: ctx.principal.clone(),
                origin: ctx.origin.clone(),
                last_seen_ms: ctx.timestamp_ms,
            },
        );
    }

    /// Drop sessions idle past the configured timeout. Returns the
    /// number reaped.
    pub fn reap_sessions(&self, now_ms: u64) -> usize {
        let t = self.tunables.load();
        let before = self.sessions.len();
        self.sessions.retain(|session_id, s| {
            let live = now_ms.saturating_sub(s.last_seen_ms) < t.session_idle_timeout_ms;
            if !live {
                tracing::debug!(
                    session = %session_id,
                    principal = %s.principal,
                    origin = %s.origin,
                    "Session expired"
                );
            }
            live
        });
        before - self.sessions.len()
    }

    /// Maintenance sweep: garbage-collect lapsed tables and respond to
    /// accumulated suspicious activity. Safe to skip or delay.
    pub fn sweep(&self, now_ms: u64) {
        let t = self.tunables.load();

        self.limiter.sweep_expired(now_ms, t.rate_window_ms);
        self.scorer.expire_stale(now_ms, t.profile_max_age_ms);
        self.blocked.retain(|_, b| match b.expires_at_ms {
            Some(expires) => now_ms < expires,
            None => true,
        });

        // Suspicious activity: keys past the failure threshold get their
        // origin time-boxed out of the pool, then the counter resets.
        let mut offenders: Vec<String> = Vec::new();
        self.auth_failures.retain(|key, w| {
            if now_ms.saturating_sub(w.window_start_ms) > t.auth_failure_window_ms {
                return false;
            }
            if w.count >= t.auth_failure_threshold {
                offenders.push(key.clone());
                return false;
            }
            true
        });
        for key in offenders {
            if let Some(origin) = key.split('|').nth(1) {
                if !self.is_blocked(origin, now_ms) {
                    self.block_origin(
                        origin,
                        "repeated authentication failures",
                        Some(t.auth_block_duration_ms),
                    );
                }
            }
        }

        metrics::record_gauges(self.sessions.len(), self.blocked.len());
    }

    pub fn snapshot(&self) -> GatewaySnapshot {
        GatewaySnapshot {
            active_sessions: self.sessions.len(),
            blocked_origins: self.blocked.len(),
            policies: self.engine.len(),
            threat_patterns: self.patterns.len(),
            behavior_profiles: self.scorer.profile_count(),
            tracked_rate_keys: self.limiter.tracked_keys(),
        }
    }

    /// Healthy iff there are policies and patterns to enforce and the
    /// audit writer is alive.
    pub fn is_healthy(&self) -> bool {
        !self.engine.is_empty() && !self.patterns.is_empty() && self.audit.is_healthy()
    }

    pub fn policies(&self) -> &PolicyEngine {
        &self.engine
    }

    pub fn patterns(&self) -> &PatternRegistry {
        &self.patterns
    }

    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditFilter, AuditStore, MemoryAuditStore};
    use std::time::Duration;

    fn gateway_with(config: GatewayConfig) -> (Arc<SecurityGateway>, Arc<MemoryAuditStore>) {
        let store = Arc::new(MemoryAuditStore::default());
        let trail = AuditTrail::new(store.clone());
        (Arc::new(SecurityGateway::new(&config, trail)), store)
    }

    fn gateway() -> (Arc<SecurityGateway>, Arc<MemoryAuditStore>) {
        gateway_with(GatewayConfig::default())
    }

    fn ctx(principal: &str, origin: &str) -> SecurityContext {
        SecurityContext::new(principal, origin).with_client_signature("Mozilla/5.0 test")
    }

    #[tokio::test]
    async fn test_clean_request_allowed() {
        let (gw, _) = gateway();
        let verdict = gw.validate(&ctx("alice", "10.0.0.1"));
        assert!(verdict.allowed);
    }

    #[tokio::test]
    async fn test_rate_limit_denies_with_retry_after() {
        let mut config = GatewayConfig::default();
        config.rate_limit.max_requests = 3;
        let (gw, _) = gateway_with(config);

        let base = now_millis();
        for i in 0..3 {
            let c = ctx("bob", "10.0.0.2").with_timestamp(base + i);
            assert!(gw.validate(&c).allowed);
        }
        let verdict = gw.validate(&ctx("bob", "10.0.0.2").with_timestamp(base + 10));
        assert!(!verdict.allowed);
        assert_eq!(verdict.status, 429);
        assert!(verdict.retry_after_secs.unwrap() > 0);
    }

    #[tokio::test]
    async fn test_threat_signature_denies() {
        let (gw, store) = gateway();
        let c = SecurityContext::new("mallory", "10.0.0.3")
            .with_client_signature("../../etc/passwd");
        let verdict = gw.validate(&c);
        assert!(!verdict.allowed);
        assert_eq!(verdict.status, 403);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let (entries, _) = store.query(&AuditFilter {
            action: Some("threat_detected".to_string()),
            ..Default::default()
        });
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_blocked_origin_denies_then_expires() {
        let (gw, _) = gateway();
        gw.block_origin("1.2.3.4", "test", Some(1000));

        let verdict = gw.validate(&ctx("alice", "1.2.3.4"));
        assert!(!verdict.allowed);
        assert_eq!(verdict.status, 403);

        tokio::time::sleep(Duration::from_millis(1050)).await;
        let verdict = gw.validate(&ctx("alice", "1.2.3.4"));
        assert!(verdict.allowed, "expired block should admit again");
    }

    #[tokio::test]
    async fn test_indefinite_block_survives_until_removed() {
        let (gw, _) = gateway();
        gw.block_origin("5.6.7.8", "manual", None);
        assert!(!gw.validate(&ctx("alice", "5.6.7.8")).allowed);

        assert!(gw.unblock_origin("5.6.7.8"));
        assert!(gw.validate(&ctx("alice", "5.6.7.8")).allowed);
    }

    #[tokio::test]
    async fn test_auth_failures_trip_policy_deny() {
        let (gw, _) = gateway();
        let origin = "10.0.0.9";

        for _ in 0..5 {
            gw.record(SecurityEvent::new(
                EventCategory::Authentication,
                Severity::Medium,
                "login failed: bad credentials",
                ctx("eve", origin),
            ));
        }

        let verdict = gw.validate(&ctx("eve", origin));
        assert!(!verdict.allowed);
        assert_eq!(verdict.status, 403);
    }

    #[tokio::test]
    async fn test_sweep_blocks_brute_force_origin() {
        let (gw, _) = gateway();
        let origin = "10.0.0.11";
        for _ in 0..6 {
            gw.record(SecurityEvent::new(
                EventCategory::Authentication,
                Severity::Medium,
                "login failed",
                ctx("eve", origin),
            ));
        }

        gw.sweep(now_millis());
        assert!(gw.is_blocked(origin, now_millis()));
        assert_eq!(
            gw.blocked_reason(origin).as_deref(),
            Some("repeated authentication failures")
        );
        // Counter consumed by the block.
        assert_eq!(gw.auth_failure_count(&format!("eve|{}", origin), now_millis()), 0);
    }

    #[tokio::test]
    async fn test_sessions_tracked_and_reaped() {
        let (gw, _) = gateway();
        let c = ctx("alice", "10.0.0.1").with_session("sess-1");
        assert!(gw.validate(&c).allowed);
        assert_eq!(gw.snapshot().active_sessions, 1);

        // One hour of idleness, reaper runs.
        let reaped = gw.reap_sessions(c.timestamp_ms + 3_600_001);
        assert_eq!(reaped, 1);
        assert_eq!(gw.snapshot().active_sessions, 0);
    }

    #[tokio::test]
    async fn test_health_requires_policies_and_patterns() {
        let (gw, _) = gateway();
        assert!(gw.is_healthy());
    }

    #[tokio::test]
    async fn test_tunables_hot_swap() {
        let (gw, _) = gateway();
        let mut updated = GatewayConfig::default();
        updated.rate_limit.max_requests = 1;
        gw.apply_config(&updated);

        let base = now_millis();
        assert!(gw.validate(&ctx("carl", "10.0.0.7").with_timestamp(base)).allowed);
        let verdict = gw.validate(&ctx("carl", "10.0.0.7").with_timestamp(base + 1));
        assert_eq!(verdict.status, 429);
    }
}
