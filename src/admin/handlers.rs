use axum::{extract::State, Json};
use serde::Serialize;
use std::time::Duration;

use crate::http::server::AppState;
use crate::security::bot::LedgerStats;
use crate::security::maintenance::{sweep, SweepReport};
use crate::security::rate_limit::LimiterStats;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct RateLimitingStatus {
    pub total_ips_tracked: usize,
    pub active_rate_limits: usize,
    pub limiters: Vec<LimiterStats>,
}

#[derive(Serialize)]
pub struct SecurityFeatures {
    pub rate_limiting_enabled: bool,
    pub bot_protection_enabled: bool,
    pub security_headers_enabled: bool,
    pub honeypot_protection: bool,
}

#[derive(Serialize)]
pub struct SecurityStatus {
    pub success: bool,
    pub rate_limiting: RateLimitingStatus,
    pub bot_protection: LedgerStats,
    pub security_features: SecurityFeatures,
}

#[derive(Serialize)]
pub struct ActionResult {
    pub success: bool,
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct MaintenanceResult {
    pub success: bool,
    #[serde(flatten)]
    pub report: SweepReport,
}

pub async fn get_status() -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
    })
}

pub async fn get_security_status(State(state): State<AppState>) -> Json<SecurityStatus> {
    let limiters: Vec<LimiterStats> = state.limiters.all().iter().map(|l| l.stats()).collect();
    let config = state.config.load();

    Json(SecurityStatus {
        success: true,
        rate_limiting: RateLimitingStatus {
            total_ips_tracked: limiters.iter().map(|l| l.tracked_identifiers).sum(),
            active_rate_limits: limiters.iter().map(|l| l.active_limits).sum(),
            limiters,
        },
        bot_protection: state.bot_gate.stats(),
        security_features: SecurityFeatures {
            rate_limiting_enabled: config.rate_limit.enabled,
            bot_protection_enabled: config.bot_protection.enabled,
            security_headers_enabled: config.security_headers.enabled,
            honeypot_protection: config.bot_protection.enabled,
        },
    })
}

pub async fn clear_suspicious_ips(State(state): State<AppState>) -> Json<ActionResult> {
    state.bot_gate.clear();
    Json(ActionResult {
        success: true,
        message: "Suspicious IP records cleared",
    })
}

pub async fn run_maintenance(State(state): State<AppState>) -> Json<MaintenanceResult> {
    let retention = Duration::from_secs(state.config.load().maintenance.violation_retention_secs);
    let report = sweep(&state.limiters, &state.bot_gate, retention);
    tracing::info!(
        pruned_identifiers = report.pruned_identifiers,
        compacted_violations = report.compacted_violations,
        "Manual maintenance sweep"
    );
    Json(MaintenanceResult {
        success: true,
        report,
    })
}
