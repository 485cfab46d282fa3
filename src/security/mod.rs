//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request
//!     → headers.rs (client key, strip spoofed identity)
//!     → rate_limit.rs (login / API token buckets)
//!     → [gate decides]
//!     → headers.rs (hop-by-hop + X-Forwarded-* before the upstream hop)
//! ```

pub mod headers;
pub mod rate_limit;
