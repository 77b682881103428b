//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! gate.toml
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GateConfig (validated, immutable)
//!     → shared via ArcSwap with the HTTP layer
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads + validates
//!     → server applies new quotas, bot thresholds, header policy
//! ```
//!
//! # Design Decisions
//! - All fields have defaults so an empty file is a working config
//! - A bad edit never replaces a good running config

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, BotProtectionConfig, GateConfig, ListenerConfig, MaintenanceConfig,
    ObservabilityConfig, QuotaConfig, RateLimitConfig, RouteConfig, SecurityHeadersConfig,
    StorageConfig, TlsConfig, UpstreamConfig,
};
