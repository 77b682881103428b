//! Periodic compaction of gate state.
//!
//! # Responsibilities
//! - Drop limiter identifiers whose windows have emptied
//! - Drop violation records past the retention period

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::MaintenanceConfig;
use crate::security::bot::BotGate;
use crate::security::rate_limit::RateLimiters;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub pruned_identifiers: usize,
    pub compacted_violations: usize,
}

/// Run one sweep over limiters and the ledger.
pub fn sweep(limiters: &RateLimiters, bot_gate: &BotGate, retention: Duration) -> SweepReport {
    SweepReport {
        pruned_identifiers: limiters.prune(),
        compacted_violations: bot_gate.compact(retention),
    }
}

pub struct MaintenanceTask {
    limiters: Arc<RateLimiters>,
    bot_gate: Arc<BotGate>,
    config: MaintenanceConfig,
}

impl MaintenanceTask {
    pub fn new(limiters: Arc<RateLimiters>, bot_gate: Arc<BotGate>, config: MaintenanceConfig) -> Self {
        Self {
            limiters,
            bot_gate,
            config,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("State maintenance disabled");
            return;
        }

        let retention = Duration::from_secs(self.config.violation_retention_secs);
        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs));
        // The first tick fires immediately; skip it so startup isn't a sweep.
        ticker.tick().await;

        tracing::info!(
            interval_secs = self.config.interval_secs,
            retention_secs = self.config.violation_retention_secs,
            "State maintenance starting"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = sweep(&self.limiters, &self.bot_gate, retention);
                    tracing::debug!(
                        pruned_identifiers = report.pruned_identifiers,
                        compacted_violations = report.compacted_violations,
                        "Maintenance sweep finished"
                    );
                }
                _ = shutdown.recv() => {
                    tracing::info!("State maintenance received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
