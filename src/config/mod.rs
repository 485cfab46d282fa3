//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, deserialize, JWT_SECRET override)
//!     → validation.rs (semantic checks)
//!     → PortalConfig (validated, immutable)
//!     → used to build the live server state
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server rebuilds state and swaps it atomically
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AuthConfig, CardConfig, GateConfig, LandingConfig, LimiterConfig, ListenerConfig,
    ObservabilityConfig, PortalConfig, RateLimitConfig, SecurityConfig, TimeoutConfig,
    UpstreamConfig,
};
