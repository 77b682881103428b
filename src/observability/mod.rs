//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Gate decisions produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → stdout log collection
//!     → Prometheus scrape (optional listener)
//! ```

pub mod logging;
pub mod metrics;
