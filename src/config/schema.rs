//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gate.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for the gate.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GateConfig {
    /// Public listener (bind address, TLS, proxy trust).
    pub listener: ListenerConfig,

    /// The game-library backend admitted requests are forwarded to.
    pub upstream: UpstreamConfig,

    /// Path classification for limiter selection and the registration gate.
    pub routes: RouteConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Sliding-window quotas per use-case.
    pub rate_limit: RateLimitConfig,

    /// Registration bot heuristics.
    pub bot_protection: BotProtectionConfig,

    /// Response security headers.
    pub security_headers: SecurityHeadersConfig,

    /// Snapshot persistence.
    pub storage: StorageConfig,

    /// Background compaction of limiter and ledger state.
    pub maintenance: MaintenanceConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Honour X-Real-IP / X-Forwarded-* from the fronting proxy.
    pub trust_proxy_headers: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
            trust_proxy_headers: false,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Upstream backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Backend address (e.g., "127.0.0.1:5000").
    pub address: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:5000".to_string(),
        }
    }
}

/// Which limiter guards which paths.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Prefixes counted against the authentication quota.
    pub auth_prefixes: Vec<String>,

    /// Prefixes counted against the search quota.
    pub search_prefixes: Vec<String>,

    /// Registration endpoint; submissions also pass the bot gate.
    pub registration_path: String,

    /// Endpoint answered by the gate with a fresh form token.
    pub form_token_path: String,

    /// Paths that bypass rate limiting entirely.
    pub exempt_paths: Vec<String>,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            auth_prefixes: vec!["/api/auth".to_string()],
            search_prefixes: vec![
                "/api/users/search".to_string(),
                "/api/games/search".to_string(),
            ],
            registration_path: "/api/auth/register".to_string(),
            form_token_path: "/api/auth/form-token".to_string(),
            exempt_paths: vec![HEALTH_PATH.to_string()],
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// A single `(max_requests, window)` quota.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct QuotaConfig {
    pub max_requests: u32,
    pub window_secs: u64,
}

impl QuotaConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Login/registration attempts.
    pub auth: QuotaConfig,

    /// Catalog and user searches.
    pub search: QuotaConfig,

    /// Everything else.
    pub api: QuotaConfig,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auth: QuotaConfig {
                max_requests: 5,
                window_secs: 300,
            },
            search: QuotaConfig {
                max_requests: 20,
                window_secs: 60,
            },
            api: QuotaConfig {
                max_requests: 100,
                window_secs: 60,
            },
        }
    }
}

/// Registration bot heuristics.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BotProtectionConfig {
    /// Enable the registration gate.
    pub enabled: bool,

    /// Submissions faster than this are rejected.
    pub min_fill_secs: f64,

    /// Submissions older than this are rejected as stale.
    pub max_fill_secs: f64,

    /// Violations within the lookback that block an IP.
    pub block_threshold: usize,

    /// Lookback for the block decision.
    pub block_window_secs: u64,

    /// Throwaway-mail domains refused at registration.
    pub disposable_domains: Vec<String>,
}

impl Default for BotProtectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_fill_secs: 3.0,
            max_fill_secs: 1800.0,
            block_threshold: 5,
            block_window_secs: 3600,
            disposable_domains: [
                "10minutemail.com",
                "tempmail.org",
                "guerrillamail.com",
                "mailinator.com",
                "yopmail.com",
                "temp-mail.org",
            ]
            .iter()
            .map(|d| d.to_string())
            .collect(),
        }
    }
}

/// Response security headers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityHeadersConfig {
    /// Enable security headers.
    pub enabled: bool,

    /// Extra origins allowed in `script-src`.
    pub script_sources: Vec<String>,

    /// Extra origins allowed in `connect-src`.
    pub connect_sources: Vec<String>,

    /// Extra origins allowed in `frame-src`.
    pub frame_sources: Vec<String>,

    /// `max-age` for Strict-Transport-Security.
    pub hsts_max_age_secs: u64,
}

impl Default for SecurityHeadersConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            script_sources: vec![
                "https://www.youtube.com".to_string(),
                "https://www.google.com".to_string(),
            ],
            connect_sources: vec![
                "https://api.rawg.io".to_string(),
                "https://www.googleapis.com".to_string(),
            ],
            frame_sources: vec!["https://www.youtube.com".to_string()],
            hsts_max_age_secs: 31_536_000,
        }
    }
}

/// Snapshot persistence.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Persist state to disk. When off, state lives in memory only.
    pub enabled: bool,

    /// Directory holding the snapshot files.
    pub directory: PathBuf,
}

impl StorageConfig {
    pub fn rate_limit_path(&self, limiter: &str) -> PathBuf {
        self.directory.join(format!("rate_limits_{}.json", limiter))
    }

    pub fn bot_protection_path(&self) -> PathBuf {
        self.directory.join("bot_protection.json")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: std::env::temp_dir().join("gamelib-gate"),
        }
    }
}

/// Background maintenance.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Enable the periodic sweep.
    pub enabled: bool,

    /// Sweep interval in seconds.
    pub interval_secs: u64,

    /// Violation records older than this are dropped.
    pub violation_retention_secs: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 600,
            violation_retention_secs: 24 * 3600,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

pub const PLACEHOLDER_API_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

/// Liveness endpoint answered by the gate itself.
pub const HEALTH_PATH: &str = "/health";

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: PLACEHOLDER_API_KEY.to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
