//! Per-IP violation history.
//!
//! Every failed heuristic appends a record and is written through to the
//! store at once. Block decisions only look at the trailing lookback;
//! older records stay until [`ViolationLedger::compact`] removes them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::observability::metrics;
use crate::storage::SnapshotStore;

/// Records reported per IP in the recent-activity sample.
const RECENT_PER_IP: usize = 5;
/// Size of the recent-activity sample.
const RECENT_TOTAL: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationRecord {
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

/// Persisted form of the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    #[serde(default)]
    pub suspicious_ips: HashMap<String, Vec<ViolationRecord>>,
    #[serde(default)]
    pub honeypot_hits: HashMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentActivity {
    pub ip: String,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LedgerStats {
    pub suspicious_ips_count: usize,
    /// IPs that ever filled a honeypot.
    pub honeypot_ips: usize,
    /// Total honeypot hits across all IPs.
    pub honeypot_hits: u64,
    pub recent_suspicious_activity: Vec<RecentActivity>,
}

pub struct ViolationLedger {
    state: Mutex<LedgerSnapshot>,
    store: Arc<dyn SnapshotStore<LedgerSnapshot>>,
}

impl ViolationLedger {
    /// Restore from the store; a failed load starts an empty ledger.
    pub fn load(store: Arc<dyn SnapshotStore<LedgerSnapshot>>) -> Self {
        let state = match store.load() {
            Ok(Some(snapshot)) => {
                tracing::info!(
                    ips = snapshot.suspicious_ips.len(),
                    store = %store.describe(),
                    "Restored violation ledger"
                );
                snapshot
            }
            Ok(None) => LedgerSnapshot::default(),
            Err(e) => {
                tracing::warn!(
                    store = %store.describe(),
                    error = %e,
                    "Could not restore violation ledger, starting empty"
                );
                LedgerSnapshot::default()
            }
        };

        Self {
            state: Mutex::new(state),
            store,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LedgerSnapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a violation for `ip` and persist.
    pub fn record(&self, ip: &str, reason: &str, at: DateTime<Utc>) {
        let mut state = self.lock();
        state
            .suspicious_ips
            .entry(ip.to_string())
            .or_default()
            .push(ViolationRecord {
                timestamp: at,
                reason: reason.to_string(),
            });
        self.save(&state);
    }

    /// Count a honeypot hit for `ip`. Not persisted on its own; the
    /// accompanying [`record`](Self::record) call writes it out.
    pub fn record_honeypot_hit(&self, ip: &str) {
        *self.lock().honeypot_hits.entry(ip.to_string()).or_default() += 1;
    }

    /// Violations for `ip` strictly after `since`.
    pub fn count_since(&self, ip: &str, since: DateTime<Utc>) -> usize {
        self.lock()
            .suspicious_ips
            .get(ip)
            .map(|records| records.iter().filter(|r| r.timestamp > since).count())
            .unwrap_or(0)
    }

    pub fn honeypot_hits(&self, ip: &str) -> u64 {
        self.lock().honeypot_hits.get(ip).copied().unwrap_or(0)
    }

    /// Forget everything and persist the empty ledger.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.suspicious_ips.clear();
        state.honeypot_hits.clear();
        self.save(&state);
    }

    /// Drop records at or before `cutoff`, and IPs left with none.
    /// Returns the number of records removed.
    pub fn compact(&self, cutoff: DateTime<Utc>) -> usize {
        let mut state = self.lock();
        let mut removed = 0;
        state.suspicious_ips.retain(|_, records| {
            let before = records.len();
            records.retain(|r| r.timestamp > cutoff);
            removed += before - records.len();
            !records.is_empty()
        });
        if removed > 0 {
            self.save(&state);
        }
        removed
    }

    pub fn stats(&self) -> LedgerStats {
        let state = self.lock();
        let mut recent: Vec<RecentActivity> = state
            .suspicious_ips
            .iter()
            .flat_map(|(ip, records)| {
                let skip = records.len().saturating_sub(RECENT_PER_IP);
                records.iter().skip(skip).map(move |r| RecentActivity {
                    ip: ip.clone(),
                    timestamp: r.timestamp,
                    reason: r.reason.clone(),
                })
            })
            .collect();
        recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        recent.truncate(RECENT_TOTAL);

        LedgerStats {
            suspicious_ips_count: state.suspicious_ips.len(),
            honeypot_ips: state.honeypot_hits.len(),
            honeypot_hits: state.honeypot_hits.values().sum(),
            recent_suspicious_activity: recent,
        }
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.lock().clone()
    }

    /// Persist the current state (used on shutdown).
    pub fn flush(&self) {
        let state = self.lock();
        self.save(&state);
    }

    fn save(&self, state: &LedgerSnapshot) {
        if let Err(e) = self.store.save(state) {
            tracing::warn!(
                store = %self.store.describe(),
                error = %e,
                "Failed to persist violation ledger, continuing in memory"
            );
            metrics::record_persist_failure("violation_ledger");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{JsonFileStore, MemoryStore};
    use chrono::{Duration, TimeZone};

    fn t(mins: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::minutes(mins)
    }

    #[test]
    fn test_record_is_written_through() {
        let store = Arc::new(MemoryStore::<LedgerSnapshot>::new());
        let ledger = ViolationLedger::load(store.clone());
        ledger.record("1.2.3.4", "Suspicious user agent", t(0));
        ledger.record("1.2.3.4", "Suspicious email pattern", t(1));
        assert_eq!(store.save_count(), 2);

        let saved = store.load().unwrap().unwrap();
        assert_eq!(saved.suspicious_ips["1.2.3.4"].len(), 2);
        assert_eq!(saved.suspicious_ips["1.2.3.4"][1].reason, "Suspicious email pattern");
    }

    #[test]
    fn test_count_since_filters_by_time() {
        let ledger = ViolationLedger::load(Arc::new(MemoryStore::<LedgerSnapshot>::new()));
        ledger.record("ip", "a", t(0));
        ledger.record("ip", "b", t(30));
        ledger.record("ip", "c", t(59));
        assert_eq!(ledger.count_since("ip", t(0)), 2);
        assert_eq!(ledger.count_since("ip", t(-1)), 3);
        assert_eq!(ledger.count_since("other", t(-1)), 0);
    }

    #[test]
    fn test_clear_and_compact() {
        let ledger = ViolationLedger::load(Arc::new(MemoryStore::<LedgerSnapshot>::new()));
        ledger.record("old", "a", t(0));
        ledger.record("mixed", "a", t(0));
        ledger.record("mixed", "b", t(120));
        ledger.record_honeypot_hit("mixed");

        assert_eq!(ledger.compact(t(60)), 2);
        let snapshot = ledger.snapshot();
        assert!(!snapshot.suspicious_ips.contains_key("old"));
        assert_eq!(snapshot.suspicious_ips["mixed"].len(), 1);

        ledger.clear();
        assert_eq!(ledger.count_since("mixed", t(-1)), 0);
        assert_eq!(ledger.honeypot_hits("mixed"), 0);
    }

    #[test]
    fn test_stats_sample_is_recent_first_and_capped() {
        let ledger = ViolationLedger::load(Arc::new(MemoryStore::<LedgerSnapshot>::new()));
        for i in 0..8 {
            ledger.record("a", "ua", t(i));
        }
        for i in 0..8 {
            ledger.record("b", "email", t(100 + i));
        }
        ledger.record_honeypot_hit("b");
        ledger.record_honeypot_hit("b");

        let stats = ledger.stats();
        assert_eq!(stats.suspicious_ips_count, 2);
        assert_eq!(stats.honeypot_ips, 1);
        assert_eq!(stats.honeypot_hits, 2);
        assert_eq!(stats.recent_suspicious_activity.len(), 10);
        assert_eq!(stats.recent_suspicious_activity[0].timestamp, t(107));
        // Only the last five per IP are sampled.
        assert_eq!(
            stats.recent_suspicious_activity.iter().filter(|r| r.ip == "b").count(),
            5
        );
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot_protection.json");

        let ledger = ViolationLedger::load(Arc::new(JsonFileStore::new(&path)));
        ledger.record_honeypot_hit("9.9.9.9");
        ledger.record("9.9.9.9", "Honeypot field filled", t(0));

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("suspicious_ips"));
        assert!(raw.contains("2024-05-01T12:00:00Z"));

        let reloaded = ViolationLedger::load(Arc::new(JsonFileStore::new(&path)));
        assert_eq!(reloaded.count_since("9.9.9.9", t(-1)), 1);
        assert_eq!(reloaded.honeypot_hits("9.9.9.9"), 1);
    }
}
