//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → router.rs (exempt? search? auth? otherwise api)
//!     → LimiterKind for the rate limit layer
//!     → registration flag for the bot gate
//! ```
//!
//! # Design Decisions
//! - Classification compiled at startup, immutable at runtime
//! - Prefix matching only, no regex in the hot path

pub mod router;

pub use router::{LimiterKind, RouteTable};
