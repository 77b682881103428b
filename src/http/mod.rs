//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, gate layers, TLS via tls.rs)
//!     → security middleware (headers, client info, rate limit)
//!     → handlers.rs (health, form token, registration gate, fallback)
//!     → proxy.rs (forward to the upstream, relay the response)
//! ```

pub mod handlers;
pub mod proxy;
pub mod server;
pub mod tls;

pub use server::{AppState, GateError, HttpServer};
