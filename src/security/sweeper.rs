//! Background maintenance loops.
//!
//! Three independent schedules: suspicious-activity/table-GC sweep,
//! session reaper, and threat-intel refresh. Each arm ticks and runs its
//! body to completion before the next tick is taken, so a sweep can
//! never overlap itself. These are maintenance paths: a skipped or late
//! tick loses nothing.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::config::schema::{AuditConfig, SweepConfig, ThreatIntelConfig};
use crate::security::context::now_millis;
use crate::security::orchestrator::SecurityGateway;
use crate::security::threat::ThreatPattern;

pub struct Sweeper {
    gateway: Arc<SecurityGateway>,
    sweeps: SweepConfig,
    intel: ThreatIntelConfig,
    audit: AuditConfig,
    client: reqwest::Client,
}

impl Sweeper {
    pub fn new(
        gateway: Arc<SecurityGateway>,
        sweeps: SweepConfig,
        intel: ThreatIntelConfig,
        audit: AuditConfig,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(intel.timeout_secs.max(1)))
            .build()
            .unwrap_or_default();
        Self {
            gateway,
            sweeps,
            intel,
            audit,
            client,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            maintenance_secs = self.sweeps.maintenance_secs,
            session_reap_secs = self.sweeps.session_reap_secs,
            intel_refresh_secs = self.sweeps.intel_refresh_secs,
            "Sweeper starting"
        );

        let mut maintenance = time::interval(Duration::from_secs(self.sweeps.maintenance_secs.max(1)));
        let mut reaper = time::interval(Duration::from_secs(self.sweeps.session_reap_secs.max(1)));
        let mut intel = time::interval(Duration::from_secs(self.sweeps.intel_refresh_secs.max(1)));
        maintenance.set_missed_tick_behavior(MissedTickBehavior::Delay);
        reaper.set_missed_tick_behavior(MissedTickBehavior::Delay);
        intel.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = maintenance.tick() => {
                    self.gateway.sweep(now_millis());
                }
                _ = reaper.tick() => {
                    self.gateway.reap_sessions(now_millis());
                    let horizon = Utc::now() - ChronoDuration::days(self.audit.retention_days);
                    self.gateway.audit().purge(horizon);
                }
                _ = intel.tick() => {
                    self.refresh_intel().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Pull the configured feed and merge unseen patterns. Failures are
    /// logged and the current pattern set stays in force.
    async fn refresh_intel(&self) {
        if self.intel.feed_url.is_empty() {
            return;
        }

        let response = match self.client.get(&self.intel.feed_url).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "Threat intel fetch failed");
                return;
            }
        };
        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "Threat intel feed returned non-success");
            return;
        }

        match response.json::<Vec<ThreatPattern>>().await {
            Ok(feed) => {
                let added = self.gateway.patterns().merge_feed(feed);
                if added > 0 {
                    tracing::info!(added, "Threat intel patterns merged");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Threat intel feed payload malformed");
            }
        }
    }
}
