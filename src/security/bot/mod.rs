//! Registration bot gate.
//!
//! # Data Flow
//! ```text
//! registration body + client IP + User-Agent
//!     → heuristics.rs (user agent, form timing, email, honeypot)
//!     → ledger.rs (record each failure, write-through)
//!     → block decision (violations in the trailing lookback)
//!     → BotVerdict { accepted, reasons }
//! ```
//!
//! All failing checks are reported together. A blocked IP is rejected even
//! when the current submission is clean.

pub mod form;
pub mod heuristics;
pub mod ledger;

use arc_swap::ArcSwap;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{checked_cutoff, epoch_secs, Clock};
use crate::config::BotProtectionConfig;
use crate::observability::metrics;

pub use form::{FormToken, RegistrationForm};
pub use heuristics::Violation;
pub use ledger::{LedgerSnapshot, LedgerStats, ViolationLedger};

pub const BLOCKED_MESSAGE: &str = "Too many suspicious activities detected";

/// Thresholds the gate judges submissions by.
#[derive(Debug, Clone)]
pub struct BotPolicy {
    pub enabled: bool,
    pub min_fill_secs: f64,
    pub max_fill_secs: f64,
    pub block_threshold: usize,
    pub block_window: Duration,
    pub disposable_domains: HashSet<String>,
}

impl From<&BotProtectionConfig> for BotPolicy {
    fn from(config: &BotProtectionConfig) -> Self {
        Self {
            enabled: config.enabled,
            min_fill_secs: config.min_fill_secs,
            max_fill_secs: config.max_fill_secs,
            block_threshold: config.block_threshold,
            block_window: Duration::from_secs(config.block_window_secs),
            disposable_domains: config
                .disposable_domains
                .iter()
                .map(|d| d.to_ascii_lowercase())
                .collect(),
        }
    }
}

impl Default for BotPolicy {
    fn default() -> Self {
        Self::from(&BotProtectionConfig::default())
    }
}

/// Outcome of one registration check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BotVerdict {
    pub accepted: bool,
    pub reasons: Vec<String>,
    /// The IP was over the violation threshold.
    pub blocked: bool,
}

pub struct BotGate {
    policy: ArcSwap<BotPolicy>,
    ledger: ViolationLedger,
    clock: Arc<dyn Clock>,
}

impl BotGate {
    pub fn new(policy: BotPolicy, ledger: ViolationLedger, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy: ArcSwap::from_pointee(policy),
            ledger,
            clock,
        }
    }

    pub fn ledger(&self) -> &ViolationLedger {
        &self.ledger
    }

    pub fn reconfigure(&self, policy: BotPolicy) {
        tracing::info!(
            enabled = policy.enabled,
            block_threshold = policy.block_threshold,
            "Bot protection policy updated"
        );
        self.policy.store(Arc::new(policy));
    }

    /// Run every heuristic against a registration attempt.
    pub fn validate_registration(
        &self,
        form: &RegistrationForm,
        client_ip: &str,
        user_agent: Option<&str>,
    ) -> BotVerdict {
        let policy = self.policy.load();
        if !policy.enabled {
            return BotVerdict {
                accepted: true,
                reasons: Vec::new(),
                blocked: false,
            };
        }

        let now = self.clock.now();
        let mut violations = Vec::new();

        if heuristics::is_suspicious_user_agent(user_agent) {
            violations.push(Violation::SuspiciousUserAgent);
        }
        if let Some(rendered_at) = form.form_timestamp() {
            if !heuristics::check_form_timing(rendered_at, now, policy.min_fill_secs, policy.max_fill_secs) {
                violations.push(Violation::SuspiciousFormTiming);
            }
        }
        if !heuristics::is_acceptable_email(form.email(), &policy.disposable_domains) {
            violations.push(Violation::SuspiciousEmail);
        }
        if heuristics::honeypot_triggered(form) {
            violations.push(Violation::HoneypotFilled);
        }

        for violation in &violations {
            if *violation == Violation::HoneypotFilled {
                self.ledger.record_honeypot_hit(client_ip);
            }
            self.ledger.record(client_ip, violation.ledger_reason(), now);
            metrics::record_violation(violation.metric_label());
        }

        let mut reasons: Vec<String> = violations.iter().map(|v| v.message().to_string()).collect();

        let blocked = self.is_blocked_at(&policy, client_ip, now);
        if blocked {
            reasons.push(BLOCKED_MESSAGE.to_string());
            metrics::record_bot_rejection("blocked");
        }
        for violation in &violations {
            metrics::record_bot_rejection(violation.metric_label());
        }

        let accepted = reasons.is_empty();
        if accepted {
            tracing::debug!(client = %client_ip, "Registration passed bot checks");
        } else {
            tracing::warn!(
                client = %client_ip,
                blocked,
                reasons = ?reasons,
                "Registration rejected by bot checks"
            );
        }

        BotVerdict {
            accepted,
            reasons,
            blocked,
        }
    }

    /// Whether `client_ip` is over the violation threshold right now.
    pub fn is_blocked(&self, client_ip: &str) -> bool {
        let policy = self.policy.load();
        self.is_blocked_at(&policy, client_ip, self.clock.now())
    }

    fn is_blocked_at(&self, policy: &BotPolicy, client_ip: &str, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.ledger.count_since(client_ip, checked_cutoff(now, policy.block_window)) >= policy.block_threshold
    }

    /// Issue the timestamp and decoy field name for a fresh form.
    pub fn issue_form_token(&self) -> FormToken {
        let now = self.clock.now();
        FormToken {
            form_timestamp: epoch_secs(now),
            honeypot_field: form::decoy_field_name(now.timestamp()),
        }
    }

    pub fn stats(&self) -> LedgerStats {
        self.ledger.stats()
    }

    pub fn clear(&self) {
        self.ledger.clear();
        tracing::info!("Violation ledger cleared");
    }

    /// Drop violation records older than `retention`.
    pub fn compact(&self, retention: Duration) -> usize {
        let removed = self.ledger.compact(checked_cutoff(self.clock.now(), retention));
        if removed > 0 {
            tracing::debug!(removed, "Compacted violation ledger");
        }
        removed
    }
}
