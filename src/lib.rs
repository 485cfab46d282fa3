//! HJM hospital access portal.
//!
//! Serves the module selection page and fronts the hospital's
//! sub-applications, guarding the reports module with a session gate.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ http::server ──▶ http::middleware::gate ──▶ http::proxy ──▶ upstream
//!                    │                   │
//!                    │                   ├── gate (policy, decisions)
//!                    │                   ├── auth (JWT verification)
//!                    │                   └── security (rate limits, headers)
//!                    ├── landing (module cards at "/")
//!                    └── routing (path prefix → upstream)
//!
//!     Cross-cutting: config (TOML, reload), observability, lifecycle
//! ```

// Core subsystems
pub mod config;
pub mod gate;
pub mod http;
pub mod landing;
pub mod routing;

// Collaborators of the gate
pub mod auth;
pub mod security;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::PortalConfig;
pub use gate::{Decision, Gate, GateRequest};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
