//! Request gate for the game-library backend.
//!
//! A reverse proxy that sits in front of the backend and decides, per
//! request, whether it may pass.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌──────────────────────────────────────────────────┐
//!                       │                  REQUEST GATE                    │
//!                       │                                                  │
//!   Client Request      │  ┌──────────┐   ┌───────────┐   ┌────────────┐   │
//!   ────────────────────┼─▶│  http    │──▶│ client_ip │──▶│  routing   │   │
//!                       │  │  server  │   │ resolve   │   │ classify   │   │
//!                       │  └──────────┘   └───────────┘   └─────┬──────┘   │
//!                       │                                       ▼          │
//!                       │                 ┌───────────┐   ┌────────────┐   │
//!                       │                 │ bot gate  │◀──│ rate_limit │   │
//!                       │                 │ (register)│   │ auth/search│   │
//!                       │                 └─────┬─────┘   │    /api    │   │
//!                       │                       ▼         └────────────┘   │
//!   Client Response     │  ┌──────────┐   ┌───────────┐                    │
//!   ◀───────────────────┼──│ security │◀──│   proxy   │◀───────────────────┼── Upstream
//!                       │  │ headers  │   │  forward  │                    │
//!                       │  └──────────┘   └───────────┘                    │
//!                       │                                                  │
//!                       │  storage (JSON snapshots) · config (hot reload)  │
//!                       │  admin API · observability · lifecycle           │
//!                       └──────────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod routing;
pub mod security;
pub mod storage;

// Cross-cutting concerns
pub mod admin;
pub mod clock;
pub mod lifecycle;
pub mod observability;

pub use config::schema::GateConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
