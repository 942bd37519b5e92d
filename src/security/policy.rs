//! Policy engine: priority-ordered condition → action evaluation.
//!
//! Conditions are a closed set of predicates over the request context and
//! the signals produced by earlier pipeline stages — not an expression
//! language. `allow`/`deny` short-circuit; `monitor`/`alert` are recorded
//! and evaluation continues, so a request can be both flagged and
//! admitted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

use crate::error::GatewayError;
use crate::security::context::{SecurityContext, Severity};
use crate::security::rate_limit::RateLimitDecision;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Allow,
    Deny,
    Monitor,
    Alert,
}

impl RuleAction {
    /// Event severity for non-terminal actions.
    pub fn severity(&self) -> Severity {
        match self {
            RuleAction::Alert => Severity::High,
            _ => Severity::Medium,
        }
    }
}

/// Closed predicate set evaluated by match dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleCondition {
    /// Recent authentication failures for the principal reached `count`.
    AuthFailuresAtLeast { count: u32 },
    /// Behavioral deviation score strictly above `threshold`.
    DeviationAbove { threshold: f64 },
    /// The rate limiter denied this request.
    RateLimitExceeded,
    /// Request carries no authenticated principal.
    AnonymousPrincipal,
}

/// Signal bundle from the earlier pipeline stages.
#[derive(Debug, Clone, Copy)]
pub struct RuleSignals {
    pub rate: RateLimitDecision,
    pub deviation: f64,
    pub auth_failures: u32,
}

impl RuleCondition {
    pub fn evaluate(&self, ctx: &SecurityContext, signals: &RuleSignals) -> bool {
        match self {
            RuleCondition::AuthFailuresAtLeast { count } => signals.auth_failures >= *count,
            RuleCondition::DeviationAbove { threshold } => signals.deviation > *threshold,
            RuleCondition::RateLimitExceeded => !signals.rate.allowed,
            RuleCondition::AnonymousPrincipal => ctx.is_anonymous(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityRule {
    pub id: String,
    pub name: String,
    pub condition: RuleCondition,
    pub action: RuleAction,
    /// Lower values evaluate first within a policy.
    pub priority: u32,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityPolicy {
    pub id: String,
    pub name: String,
    pub description: String,
    pub rules: Vec<SecurityRule>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update applied via the admin API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub enabled: Option<bool>,
    pub rules: Option<Vec<SecurityRule>>,
}

/// A rule whose condition held during evaluation.
#[derive(Debug, Clone)]
pub struct TriggeredRule {
    pub policy_id: String,
    pub rule_id: String,
    pub rule_name: String,
    pub action: RuleAction,
}

/// Outcome of a full evaluation pass.
#[derive(Debug, Clone)]
pub struct PolicyDecision {
    pub allowed: bool,
    /// The terminal allow/deny rule, if any matched.
    pub matched: Option<TriggeredRule>,
    /// Monitor/alert rules that fired along the way.
    pub flagged: Vec<TriggeredRule>,
}

/// Operator-mutable registry of policies, evaluated in registration order.
pub struct PolicyEngine {
    policies: RwLock<Vec<SecurityPolicy>>,
}

impl PolicyEngine {
    pub fn new() -> Self {
        Self {
            policies: RwLock::new(Vec::new()),
        }
    }

    pub fn with_defaults() -> Self {
        let engine = Self::new();
        for policy in default_policies() {
            engine.insert(policy);
        }
        engine
    }

    pub fn insert(&self, policy: SecurityPolicy) {
        let mut policies = self.policies.write().expect("policy registry poisoned");
        policies.push(policy);
    }

    pub fn update(&self, id: &str, update: PolicyUpdate) -> Result<SecurityPolicy, GatewayError> {
        let mut policies = self.policies.write().expect("policy registry poisoned");
        let policy = policies
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| GatewayError::UnknownPolicy(id.to_string()))?;

        if let Some(name) = update.name {
            policy.name = name;
        }
        if let Some(description) = update.description {
            policy.description = description;
        }
        if let Some(enabled) = update.enabled {
            policy.enabled = enabled;
        }
        if let Some(rules) = update.rules {
            policy.rules = rules;
        }
        policy.updated_at = Utc::now();
        Ok(policy.clone())
    }

    pub fn list(&self) -> Vec<SecurityPolicy> {
        self.policies.read().expect("policy registry poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.policies.read().expect("policy registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Walk enabled policies in registration order, rules by ascending
    /// priority. First allow/deny wins; monitor/alert fall through.
    /// Default decision is allow.
    pub fn evaluate(&self, ctx: &SecurityContext, signals: &RuleSignals) -> PolicyDecision {
        let policies = self.policies.read().expect("policy registry poisoned");
        let mut flagged = Vec::new();

        for policy in policies.iter().filter(|p| p.enabled) {
            let mut rules: Vec<&SecurityRule> =
                policy.rules.iter().filter(|r| r.enabled).collect();
            rules.sort_by_key(|r| r.priority);

            for rule in rules {
                if !rule.condition.evaluate(ctx, signals) {
                    continue;
                }
                let triggered = TriggeredRule {
                    policy_id: policy.id.clone(),
                    rule_id: rule.id.clone(),
                    rule_name: rule.name.clone(),
                    action: rule.action,
                };
                match rule.action {
                    RuleAction::Allow => {
                        return PolicyDecision {
                            allowed: true,
                            matched: Some(triggered),
                            flagged,
                        };
                    }
                    RuleAction::Deny => {
                        return PolicyDecision {
                            allowed: false,
                            matched: Some(triggered),
                            flagged,
                        };
                    }
                    RuleAction::Monitor | RuleAction::Alert => {
                        flagged.push(triggered);
                    }
                }
            }
        }

        PolicyDecision {
            allowed: true,
            matched: None,
            flagged,
        }
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn policy(id: &str, name: &str, description: &str, rules: Vec<SecurityRule>) -> SecurityPolicy {
    SecurityPolicy {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        rules,
        enabled: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn rule(
    id: &str,
    name: &str,
    condition: RuleCondition,
    action: RuleAction,
    priority: u32,
) -> SecurityRule {
    SecurityRule {
        id: id.to_string(),
        name: name.to_string(),
        condition,
        action,
        priority,
        enabled: true,
    }
}

/// Built-in policy set. Operators reshape these at runtime; request
/// traffic never creates or mutates them.
pub fn default_policies() -> Vec<SecurityPolicy> {
    vec![
        policy(
            "credential-abuse",
            "Credential abuse protection",
            "Deny principals hammering authentication",
            vec![
                rule(
                    "auth-failures-deny",
                    "Excessive authentication failures",
                    RuleCondition::AuthFailuresAtLeast { count: 5 },
                    RuleAction::Deny,
                    10,
                ),
                rule(
                    "auth-failures-alert",
                    "Elevated authentication failures",
                    RuleCondition::AuthFailuresAtLeast { count: 3 },
                    RuleAction::Alert,
                    20,
                ),
            ],
        ),
        policy(
            "behavioral-watch",
            "Behavioral anomaly watch",
            "Flag requests deviating from the principal's history",
            vec![
                rule(
                    "deviation-alert",
                    "High behavioral deviation",
                    RuleCondition::DeviationAbove { threshold: 0.8 },
                    RuleAction::Alert,
                    10,
                ),
                rule(
                    "deviation-monitor",
                    "Moderate behavioral deviation",
                    RuleCondition::DeviationAbove { threshold: 0.5 },
                    RuleAction::Monitor,
                    20,
                ),
            ],
        ),
        policy(
            "rate-abuse",
            "Rate abuse backstop",
            "Deny anything the limiter already rejected",
            vec![rule(
                "rate-exceeded-deny",
                "Rate limit exceeded",
                RuleCondition::RateLimitExceeded,
                RuleAction::Deny,
                10,
            )],
        ),
    ]
}
