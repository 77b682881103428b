//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gate_requests_total` (counter): requests by route class and status
//! - `gate_rate_limited_total` (counter): denials by limiter
//! - `gate_bot_rejections_total` (counter): rejected registrations by reason
//! - `gate_violations_total` (counter): ledger records by reason
//! - `gate_persist_failures_total` (counter): failed snapshot writes by store
//! - `gate_tracked_identifiers` (gauge): identifiers held per limiter
//!
//! Recording is a no-op until a recorder is installed, so tests and
//! metrics-disabled deployments pay nothing.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(class: &'static str, status: u16) {
    counter!("gate_requests_total", "class" => class, "status" => status.to_string()).increment(1);
}

pub fn record_rate_limited(limiter: &str) {
    counter!("gate_rate_limited_total", "limiter" => limiter.to_string()).increment(1);
}

pub fn record_bot_rejection(reason: &'static str) {
    counter!("gate_bot_rejections_total", "reason" => reason).increment(1);
}

pub fn record_violation(reason: &'static str) {
    counter!("gate_violations_total", "reason" => reason).increment(1);
}

pub fn record_persist_failure(store: &str) {
    counter!("gate_persist_failures_total", "store" => store.to_string()).increment(1);
}

pub fn record_tracked_identifiers(limiter: &str, count: usize) {
    gauge!("gate_tracked_identifiers", "limiter" => limiter.to_string()).set(count as f64);
}
