//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers)
//!     → request.rs (request ID, peer address)
//!     → middleware/gate.rs (gate decision, identity headers)
//!     → server.rs handlers: landing page, /healthz, or
//!     → proxy.rs (forward to the matched upstream)
//!     → Send to client
//! ```

pub mod middleware;
pub mod proxy;
pub mod request;
pub mod server;

pub use proxy::ProxyError;
pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer, LiveState};
