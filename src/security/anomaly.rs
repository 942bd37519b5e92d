//! Behavioral anomaly scoring against per-principal access history.
//!
//! The score is the mean of three sub-scores (origin frequency, client
//! signature frequency, time-of-day drift). Deliberately simple and
//! explainable; the exact averaging is load-bearing for tests and audit
//! review, so keep the arithmetic as-is.

use dashmap::DashMap;

use crate::security::context::{now_millis, SecurityContext};

const DAY_MS: f64 = 86_400_000.0;

/// One observed access, appended to a principal's history after scoring.
#[derive(Debug, Clone)]
pub struct AccessFingerprint {
    pub origin: String,
    pub client_signature: String,
    pub timestamp_ms: u64,
}

/// Per-principal behavioral record.
#[derive(Debug, Default)]
pub struct BehaviorProfile {
    pub history: Vec<AccessFingerprint>,
    pub last_seen_ms: u64,
    pub last_deviation: f64,
    pub risk_factors: Vec<String>,
}

/// Scores each request's deviation from the principal's history.
pub struct AnomalyScorer {
    profiles: DashMap<String, BehaviorProfile>,
    /// History entries kept per principal; oldest dropped beyond this.
    max_history: usize,
}

impl AnomalyScorer {
    pub fn new(max_history: usize) -> Self {
        Self {
            profiles: DashMap::new(),
            max_history: max_history.max(1),
        }
    }

    /// Deviation in [0, 1] for this request. First observation of a
    /// principal creates an empty profile and scores 0 (cold start).
    pub fn score(&self, ctx: &SecurityContext) -> f64 {
        let mut profile = self.profiles.entry(ctx.principal.clone()).or_default();

        let deviation = if profile.history.is_empty() {
            0.0
        } else {
            let origin_dev = frequency_deviation(&profile.history, |f| &f.origin, &ctx.origin);
            let signature_dev = frequency_deviation(
                &profile.history,
                |f| &f.client_signature,
                &ctx.client_signature,
            );
            let time_dev = time_of_day_deviation(&profile.history, ctx.timestamp_ms);
            (origin_dev + signature_dev + time_dev) / 3.0
        };

        accumulate_risk_factors(&mut profile, ctx, deviation);

        profile.history.push(AccessFingerprint {
            origin: ctx.origin.clone(),
            client_signature: ctx.client_signature.clone(),
            timestamp_ms: ctx.timestamp_ms,
        });
        if profile.history.len() > self.max_history {
            let excess = profile.history.len() - self.max_history;
            profile.history.drain(..excess);
        }
        profile.last_seen_ms = ctx.timestamp_ms;
        profile.last_deviation = deviation;

        deviation
    }

    pub fn profile_count(&self) -> usize {
        self.profiles.len()
    }

    pub fn last_deviation(&self, principal: &str) -> Option<f64> {
        self.profiles.get(principal).map(|p| p.last_deviation)
    }

    pub fn risk_factors(&self, principal: &str) -> Vec<String> {
        self.profiles
            .get(principal)
            .map(|p| p.risk_factors.clone())
            .unwrap_or_default()
    }

    /// Age-based expiry sweep. Returns the number of profiles dropped.
    pub fn expire_stale(&self, now_ms: u64, max_age_ms: u64) -> usize {
        let before = self.profiles.len();
        self.profiles
            .retain(|_, profile| profile.last_seen_ms + max_age_ms > now_ms);
        before - self.profiles.len()
    }
}

impl Default for AnomalyScorer {
    fn default() -> Self {
        Self::new(200)
    }
}

/// `|observed - expected| / expected` where `expected` is the uniform
/// share `total / distinct`. Capped at 1.0 so the published mean stays in
/// range for arbitrarily skewed histories.
fn frequency_deviation<'a, F>(history: &'a [AccessFingerprint], field: F, current: &str) -> f64
where
    F: Fn(&'a AccessFingerprint) -> &'a String,
{
    let total = history.len() as f64;
    let mut distinct: Vec<&str> = Vec::new();
    let mut observed = 0usize;
    for fingerprint in history {
        let value = field(fingerprint).as_str();
        if !distinct.contains(&value) {
            distinct.push(value);
        }
        if value == current {
            observed += 1;
        }
    }

    let expected = total / distinct.len() as f64;
    ((observed as f64 - expected).abs() / expected).min(1.0)
}

/// `min(|now - mean historical timestamp| / 24h, 1)`.
fn time_of_day_deviation(history: &[AccessFingerprint], now_ms: u64) -> f64 {
    let mean =
        history.iter().map(|f| f.timestamp_ms as f64).sum::<f64>() / history.len() as f64;
    ((now_ms as f64 - mean).abs() / DAY_MS).min(1.0)
}

fn accumulate_risk_factors(profile: &mut BehaviorProfile, ctx: &SecurityContext, deviation: f64) {
    let mut push = |factor: &str| {
        if !profile.risk_factors.iter().any(|f| f == factor) {
            profile.risk_factors.push(factor.to_string());
        }
    };

    if deviation > 0.8 {
        push("high-deviation");
    }
    if !profile.history.is_empty()
        && !profile.history.iter().any(|f| f.origin == ctx.origin)
    {
        push("new-origin");
    }
    if !profile.history.is_empty()
        && !profile
            .history
            .iter()
            .any(|f| f.client_signature == ctx.client_signature)
    {
        push("new-client-signature");
    }
}
