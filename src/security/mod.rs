//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → client_ip.rs (resolve identifier, detect TLS)
//!     → rate_limit.rs (sliding-window quota for the route class)
//!     → bot/ (registration submissions only)
//!     → forwarded upstream
//! Outgoing response:
//!     → headers.rs (CSP, nosniff, frame/referrer/permissions, HSTS)
//! ```
//!
//! # Design Decisions
//! - Checks never error out: each degrades to an admit/deny decision
//! - State persistence is best-effort and never fails a request

pub mod bot;
pub mod client_ip;
pub mod headers;
pub mod maintenance;
pub mod rate_limit;
