//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build gate state (stores, limiters, bot gate, header policy)
//! - Create the Axum router and wire up the gate layers
//! - Bind to a plain or TLS listener
//! - Apply hot-reloaded configuration
//! - Flush gate state on shutdown

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::header::InvalidHeaderValue,
    middleware,
    routing::{get, post},
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::clock::{Clock, SystemClock};
use crate::config::schema::HEALTH_PATH;
use crate::config::GateConfig;
use crate::http::handlers::{form_token_handler, health_handler, proxy_handler, register_handler};
use crate::http::tls;
use crate::routing::RouteTable;
use crate::security::bot::{BotGate, BotPolicy, LedgerSnapshot, ViolationLedger};
use crate::security::client_ip::client_info_middleware;
use crate::security::headers::{security_headers_middleware, SecurityHeaders};
use crate::security::maintenance::MaintenanceTask;
use crate::security::rate_limit::{rate_limit_middleware, RateLimiters};
use crate::storage::{JsonFileStore, MemoryStore, SnapshotStore};

/// Grace period for in-flight TLS connections on shutdown.
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum GateError {
    #[error("invalid security header value: {0}")]
    Headers(#[from] InvalidHeaderValue),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state injected into handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ArcSwap<GateConfig>>,
    pub routes: Arc<RouteTable>,
    pub limiters: Arc<RateLimiters>,
    pub bot_gate: Arc<BotGate>,
    pub headers: Arc<ArcSwap<SecurityHeaders>>,
    pub client: Client<HttpConnector, Body>,
    /// The public listener terminates TLS itself.
    pub tls: bool,
}

impl AppState {
    /// Build gate state from config with the given clock.
    pub fn new(config: GateConfig, clock: Arc<dyn Clock>) -> Result<Self, GateError> {
        let headers = SecurityHeaders::from_config(&config.security_headers)?;
        let limiters = RateLimiters::from_config(&config.rate_limit, &config.storage, clock.clone());

        let ledger_store: Arc<dyn SnapshotStore<LedgerSnapshot>> = if config.storage.enabled {
            Arc::new(JsonFileStore::new(config.storage.bot_protection_path()))
        } else {
            Arc::new(MemoryStore::new())
        };
        let bot_gate = BotGate::new(
            BotPolicy::from(&config.bot_protection),
            ViolationLedger::load(ledger_store),
            clock,
        );

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Ok(Self {
            routes: Arc::new(RouteTable::from_config(&config.routes)),
            limiters: Arc::new(limiters),
            bot_gate: Arc::new(bot_gate),
            headers: Arc::new(ArcSwap::from_pointee(headers)),
            client,
            tls: config.listener.tls.is_some(),
            config: Arc::new(ArcSwap::from_pointee(config)),
        })
    }

    /// Swap in a reloaded config. Route paths and the listener are fixed at
    /// startup; quotas, bot thresholds and header policy take effect at once.
    pub fn apply_config(&self, config: GateConfig) {
        match SecurityHeaders::from_config(&config.security_headers) {
            Ok(headers) => self.headers.store(Arc::new(headers)),
            Err(e) => {
                tracing::error!(error = %e, "Invalid security headers in reloaded config, keeping previous");
            }
        }
        self.limiters.reconfigure(&config.rate_limit);
        self.bot_gate.reconfigure(BotPolicy::from(&config.bot_protection));
        self.config.store(Arc::new(config));
        tracing::info!("Gate configuration applied");
    }

    /// Persist every store.
    pub fn flush(&self) {
        self.limiters.flush();
        self.bot_gate.ledger().flush();
    }
}

/// HTTP server for the request gate.
pub struct HttpServer {
    router: Router,
    config: GateConfig,
    state: AppState,
}

impl HttpServer {
    /// Create a new gate server with the given configuration.
    pub fn new(config: GateConfig) -> Result<Self, GateError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: GateConfig, clock: Arc<dyn Clock>) -> Result<Self, GateError> {
        let state = AppState::new(config.clone(), clock)?;
        let router = Self::build_router(&config, state.clone());
        Ok(Self {
            router,
            config,
            state,
        })
    }

    /// Build the Axum router with all gate layers.
    ///
    /// Request order: trace → request id → security headers → timeout →
    /// body limits → client info → rate limit → handler.
    #[allow(deprecated)]
    fn build_router(config: &GateConfig, state: AppState) -> Router {
        Router::new()
            .route(HEALTH_PATH, get(health_handler))
            .route(&config.routes.form_token_path, get(form_token_handler))
            .route(
                &config.routes.registration_path,
                post(register_handler).fallback(proxy_handler),
            )
            .fallback(proxy_handler)
            .layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
            .layer(middleware::from_fn_with_state(state.clone(), client_info_middleware))
            .layer(DefaultBodyLimit::max(config.limits.max_body_bytes))
            .layer(RequestBodyLimitLayer::new(config.limits.max_body_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(middleware::from_fn_with_state(state.clone(), security_headers_middleware))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Shared gate state, for the admin router.
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Run the server until `shutdown` fires, applying config updates as they arrive.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GateConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), GateError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.address,
            tls = self.state.tls,
            "Gate starting"
        );

        let maintenance = MaintenanceTask::new(
            self.state.limiters.clone(),
            self.state.bot_gate.clone(),
            self.config.maintenance.clone(),
        );
        tokio::spawn(maintenance.run(shutdown.resubscribe()));

        let reload_state = self.state.clone();
        let mut reload_shutdown = shutdown.resubscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(config) = config_updates.recv() => reload_state.apply_config(config),
                    _ = reload_shutdown.recv() => break,
                    else => break,
                }
            }
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        match &self.config.listener.tls {
            Some(tls_config) => {
                let rustls = tls::load_tls_config(tls_config).await?;
                tls::serve(listener, rustls, app, shutdown, TLS_DRAIN_TIMEOUT).await?;
            }
            None => {
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = shutdown.recv().await;
                        tracing::info!("Gate received shutdown signal");
                    })
                    .await?;
            }
        }

        self.state.flush();
        tracing::info!("Gate stopped, state flushed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::{QuotaConfig, StorageConfig};

    fn memory_config() -> GateConfig {
        GateConfig {
            storage: StorageConfig {
                enabled: false,
                ..StorageConfig::default()
            },
            ..GateConfig::default()
        }
    }

    #[test]
    fn test_apply_config_updates_quotas() {
        let state = AppState::new(memory_config(), Arc::new(ManualClock::default())).unwrap();
        assert_eq!(state.limiters.auth.policy().max_requests, 5);

        let mut updated = memory_config();
        updated.rate_limit.auth = QuotaConfig {
            max_requests: 2,
            window_secs: 60,
        };
        updated.bot_protection.enabled = false;
        state.apply_config(updated);

        assert_eq!(state.limiters.auth.policy().max_requests, 2);
        assert!(!state.config.load().bot_protection.enabled);
    }

    #[test]
    fn test_invalid_header_source_is_rejected() {
        let mut config = memory_config();
        config.security_headers.script_sources = vec!["https://bad\nsource".to_string()];
        assert!(matches!(
            AppState::new(config, Arc::new(ManualClock::default())),
            Err(GateError::Headers(_))
        ));
    }
}
