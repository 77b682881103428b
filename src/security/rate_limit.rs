//! Sliding-window rate limiting.
//!
//! Each limiter keeps, per identifier, the timestamps of admitted requests
//! inside the trailing window. Old timestamps are evicted lazily on every
//! check; denied attempts are never recorded.

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::clock::{checked_cutoff, Clock};
use crate::config::{QuotaConfig, RateLimitConfig, StorageConfig};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::routing::LimiterKind;
use crate::security::client_ip::ClientInfo;
use crate::storage::{JsonFileStore, MemoryStore, SnapshotStore};

/// Persisted form: identifier → admitted timestamps (ISO-8601 on disk).
pub type RateLimitSnapshot = HashMap<String, Vec<DateTime<Utc>>>;

pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// A `(max_requests, window)` quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    pub max_requests: u32,
    pub window: Duration,
}

impl From<QuotaConfig> for RatePolicy {
    fn from(quota: QuotaConfig) -> Self {
        Self {
            max_requests: quota.max_requests,
            window: quota.window(),
        }
    }
}

/// Aggregate view of one limiter for the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct LimiterStats {
    pub name: String,
    pub max_requests: u32,
    pub window_secs: u64,
    pub tracked_identifiers: usize,
    pub active_limits: usize,
}

pub struct SlidingWindowLimiter {
    name: String,
    policy: ArcSwap<RatePolicy>,
    windows: DashMap<String, VecDeque<DateTime<Utc>>>,
    clock: Arc<dyn Clock>,
    store: Arc<dyn SnapshotStore<RateLimitSnapshot>>,
    persist_lock: Mutex<()>,
}

impl SlidingWindowLimiter {
    /// Create a limiter and restore whatever its store last saved.
    pub fn new(
        name: impl Into<String>,
        policy: RatePolicy,
        clock: Arc<dyn Clock>,
        store: Arc<dyn SnapshotStore<RateLimitSnapshot>>,
    ) -> Self {
        let name = name.into();
        let windows = DashMap::new();

        match store.load() {
            Ok(Some(snapshot)) => {
                for (identifier, stamps) in snapshot {
                    windows.insert(identifier, stamps.into_iter().collect::<VecDeque<_>>());
                }
                tracing::info!(
                    limiter = %name,
                    identifiers = windows.len(),
                    store = %store.describe(),
                    "Restored rate limit windows"
                );
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    limiter = %name,
                    store = %store.describe(),
                    error = %e,
                    "Could not restore rate limit windows, starting empty"
                );
            }
        }

        Self {
            name,
            policy: ArcSwap::from_pointee(policy),
            windows,
            clock,
            store,
            persist_lock: Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> RatePolicy {
        **self.policy.load()
    }

    /// Replace the quota. Existing windows are kept and judged by the new quota.
    pub fn reconfigure(&self, policy: RatePolicy) {
        let old = self.policy.swap(Arc::new(policy));
        if *old != policy {
            tracing::info!(
                limiter = %self.name,
                max_requests = policy.max_requests,
                window_secs = policy.window.as_secs(),
                "Rate limit quota updated"
            );
        }
    }

    /// Admit or deny one request from `identifier`.
    ///
    /// Admission records the request and persists the new state.
    pub fn check(&self, identifier: &str) -> bool {
        let policy = self.policy();
        let now = self.clock.now();
        let start = checked_cutoff(now, policy.window);

        let admitted = {
            let mut window = self.windows.entry(identifier.to_string()).or_default();
            evict(&mut window, start);
            if window.len() >= policy.max_requests as usize {
                false
            } else {
                window.push_back(now);
                true
            }
        };

        if admitted {
            self.persist();
        } else {
            tracing::debug!(limiter = %self.name, identifier, "Quota exhausted");
        }
        admitted
    }

    /// [`check`](Self::check) on the blocking pool, so the snapshot write
    /// never stalls an async worker. Resolves once the write has finished.
    pub async fn check_blocking(self: Arc<Self>, identifier: String) -> Result<bool, tokio::task::JoinError> {
        tokio::task::spawn_blocking(move || self.check(&identifier)).await
    }

    /// Requests `identifier` may still make in the current window.
    pub fn remaining(&self, identifier: &str) -> u32 {
        let policy = self.policy();
        let start = checked_cutoff(self.clock.now(), policy.window);

        let used = match self.windows.get_mut(identifier) {
            Some(mut window) => {
                evict(&mut window, start);
                window.len()
            }
            None => 0,
        };
        policy.max_requests.saturating_sub(used as u32)
    }

    /// Hint returned with a denial: the full window length.
    pub fn retry_after(&self) -> Duration {
        self.policy().window
    }

    /// Identifiers currently holding a window, stale or not.
    pub fn tracked_identifiers(&self) -> usize {
        self.windows.len()
    }

    /// Identifiers with at least one request inside the window.
    pub fn active_limits(&self) -> usize {
        let start = checked_cutoff(self.clock.now(), self.policy().window);
        self.windows
            .iter()
            .filter(|w| w.value().iter().any(|ts| *ts > start))
            .count()
    }

    pub fn stats(&self) -> LimiterStats {
        let policy = self.policy();
        LimiterStats {
            name: self.name.clone(),
            max_requests: policy.max_requests,
            window_secs: policy.window.as_secs(),
            tracked_identifiers: self.tracked_identifiers(),
            active_limits: self.active_limits(),
        }
    }

    /// Drop identifiers whose window is empty. Returns how many were dropped.
    pub fn prune(&self) -> usize {
        let start = checked_cutoff(self.clock.now(), self.policy().window);
        let before = self.windows.len();
        self.windows.retain(|_, window| {
            evict(window, start);
            !window.is_empty()
        });
        let removed = before.saturating_sub(self.windows.len());

        metrics::record_tracked_identifiers(&self.name, self.windows.len());
        if removed > 0 {
            tracing::debug!(limiter = %self.name, removed, "Pruned idle identifiers");
            self.persist();
        }
        removed
    }

    pub fn snapshot(&self) -> RateLimitSnapshot {
        self.windows
            .iter()
            .map(|w| (w.key().clone(), w.value().iter().copied().collect()))
            .collect()
    }

    /// Write the current state to the store. Failures are logged, never raised.
    pub fn persist(&self) {
        let _guard = self.persist_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = self.snapshot();
        if let Err(e) = self.store.save(&snapshot) {
            tracing::warn!(
                limiter = %self.name,
                store = %self.store.describe(),
                error = %e,
                "Failed to persist rate limit windows, continuing in memory"
            );
            metrics::record_persist_failure(&self.name);
        }
    }
}

fn evict(window: &mut VecDeque<DateTime<Utc>>, start: DateTime<Utc>) {
    window.retain(|ts| *ts > start);
}

/// The independent limiter instances, one per use-case.
pub struct RateLimiters {
    pub auth: Arc<SlidingWindowLimiter>,
    pub search: Arc<SlidingWindowLimiter>,
    pub api: Arc<SlidingWindowLimiter>,
}

impl RateLimiters {
    /// Build all limiters with file stores (or memory stores when persistence is off).
    pub fn from_config(config: &RateLimitConfig, storage: &StorageConfig, clock: Arc<dyn Clock>) -> Self {
        let build = |kind: LimiterKind, quota: QuotaConfig| {
            let store: Arc<dyn SnapshotStore<RateLimitSnapshot>> = if storage.enabled {
                Arc::new(JsonFileStore::new(storage.rate_limit_path(kind.as_str())))
            } else {
                Arc::new(MemoryStore::new())
            };
            Arc::new(SlidingWindowLimiter::new(
                kind.as_str(),
                quota.into(),
                clock.clone(),
                store,
            ))
        };

        Self {
            auth: build(LimiterKind::Auth, config.auth),
            search: build(LimiterKind::Search, config.search),
            api: build(LimiterKind::Api, config.api),
        }
    }

    pub fn get(&self, kind: LimiterKind) -> &Arc<SlidingWindowLimiter> {
        match kind {
            LimiterKind::Auth => &self.auth,
            LimiterKind::Search => &self.search,
            LimiterKind::Api => &self.api,
        }
    }

    pub fn all(&self) -> [&Arc<SlidingWindowLimiter>; 3] {
        [&self.auth, &self.search, &self.api]
    }

    pub fn reconfigure(&self, config: &RateLimitConfig) {
        self.auth.reconfigure(config.auth.into());
        self.search.reconfigure(config.search.into());
        self.api.reconfigure(config.api.into());
    }

    pub fn prune(&self) -> usize {
        self.all().iter().map(|l| l.prune()).sum()
    }

    pub fn flush(&self) {
        for limiter in self.all() {
            limiter.persist();
        }
    }
}

/// Body of a 429 response.
#[derive(Debug, Serialize)]
struct RateLimitedBody {
    success: bool,
    message: &'static str,
    retry_after: u64,
}

fn rate_limited_response(retry_after: Duration) -> Response {
    let secs = retry_after.as_secs();
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(RateLimitedBody {
            success: false,
            message: "Rate limit exceeded. Please try again later.",
            retry_after: secs,
        }),
    )
        .into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(secs));
    response
}

/// Middleware applying the limiter that guards the request path.
///
/// Expects [`ClientInfo`] to have been attached by the client-info layer.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.load().rate_limit.enabled {
        return next.run(request).await;
    }

    let kind = match state.routes.limiter_for(request.uri().path()) {
        Some(kind) => kind,
        None => return next.run(request).await,
    };
    let client_ip = match request.extensions().get::<ClientInfo>() {
        Some(info) => info.ip.to_string(),
        None => {
            tracing::error!("Client info missing, rate limit layer misordered");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let limiter = state.limiters.get(kind);
    let admitted = match limiter.clone().check_blocking(client_ip.clone()).await {
        Ok(admitted) => admitted,
        Err(e) => {
            tracing::error!(client = %client_ip, limiter = kind.as_str(), error = %e, "Rate limit check failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    if !admitted {
        tracing::warn!(client = %client_ip, limiter = kind.as_str(), "Rate limit exceeded");
        metrics::record_rate_limited(kind.as_str());
        metrics::record_request(kind.as_str(), StatusCode::TOO_MANY_REQUESTS.as_u16());
        return rate_limited_response(limiter.retry_after());
    }

    let remaining = limiter.remaining(&client_ip);
    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(X_RATELIMIT_REMAINING, HeaderValue::from(remaining));
    response
}
