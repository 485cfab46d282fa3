//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → shutdown_signal() resolves
//!
//! Shutdown (shutdown.rs):
//!     trigger() → every subscriber (server, pruner) stops
//!     → server drains in-flight requests → Exit
//! ```
//!
//! # Design Decisions
//! - One broadcast channel fans the signal out to all long-running tasks
//! - Graceful: in-flight requests finish before the process exits

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
