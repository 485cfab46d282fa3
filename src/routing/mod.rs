//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Gate policy (at startup):
//!     GateConfig segments
//!     → matcher.rs (prefix / exact / extension predicates)
//!     → ordered rule table in gate::policy
//!
//! Forwarding (per request):
//!     request path
//!     → router.rs (upstream lookup)
//!     → matched Upstream or None
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route
//! - First match wins

pub mod matcher;
pub mod router;

pub use router::{Upstream, UpstreamRouter};
