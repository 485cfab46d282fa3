//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the portal.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the portal.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PortalConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Request gate in front of the protected sub-application.
    pub gate: GateConfig,

    /// Session token verification.
    pub auth: AuthConfig,

    /// Login and API rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Sub-application servers requests are forwarded to.
    pub upstreams: Vec<UpstreamConfig>,

    /// Landing page content.
    pub landing: LandingConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Gate configuration.
///
/// Every path below `base_path` is "inner"; the segment fields are matched
/// against the inner path, never against the full request path.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GateConfig {
    /// Fixed prefix the gate has jurisdiction over (no trailing slash).
    pub base_path: String,

    /// Name of the cookie carrying the session token.
    pub cookie_name: String,

    /// Login page, also the redirect target for unauthenticated pages.
    pub login_path: String,

    /// Public page prefixes besides the login page (documentation, ...).
    pub public_paths: Vec<String>,

    /// Prefix of every API route.
    pub api_prefix: String,

    /// Prefix of the public authentication API.
    pub auth_api_prefix: String,

    /// Login submission endpoint, throttled by the login limiter.
    pub login_submit_path: String,

    /// Health endpoint of the sub-application, public.
    pub ping_path: String,

    /// Static asset directories.
    pub asset_prefixes: Vec<String>,

    /// Static asset file extensions, without the dot.
    pub asset_extensions: Vec<String>,

    /// Key rate limits on the first `x-forwarded-for` hop instead of the peer address.
    pub trust_forwarded_for: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            base_path: "/cagpu".to_string(),
            cookie_name: "auth".to_string(),
            login_path: "/login".to_string(),
            public_paths: vec!["/documentacion".to_string()],
            api_prefix: "/api/".to_string(),
            auth_api_prefix: "/api/auth".to_string(),
            login_submit_path: "/api/auth/login".to_string(),
            ping_path: "/api/ping".to_string(),
            asset_prefixes: vec!["/_next".to_string(), "/static".to_string()],
            asset_extensions: ["png", "jpg", "jpeg", "svg", "gif", "ico", "css", "js", "map"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
            trust_forwarded_for: false,
        }
    }
}

/// Session token verification settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared HMAC secret. Overridden by the `JWT_SECRET` environment variable.
    pub jwt_secret: String,

    /// Clock skew tolerated when checking `exp`, in seconds.
    pub leeway_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            leeway_secs: 30,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Limiter for the login submission endpoint.
    pub login: LimiterConfig,

    /// Limiter for every other private API route.
    pub api: LimiterConfig,

    /// How often idle buckets are evicted, in seconds.
    pub prune_interval_secs: u64,

    /// Buckets untouched for this long are evicted, in seconds.
    pub idle_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            login: LimiterConfig {
                enabled: true,
                max_requests: 5,
                window_secs: 900, // 15 minutes
            },
            api: LimiterConfig {
                enabled: true,
                max_requests: 300,
                window_secs: 60,
            },
            prune_interval_secs: 60,
            idle_secs: 3600,
        }
    }
}

/// A single keyed limiter: `max_requests` per `window_secs`, refilled continuously.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LimiterConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Burst capacity and requests allowed per window.
    pub max_requests: u32,

    /// Window length in seconds.
    pub window_secs: u64,
}

fn default_enabled() -> bool {
    true
}

/// Upstream sub-application definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Upstream identifier for logging/metrics.
    pub name: String,

    /// Path prefix routed to this upstream.
    pub path_prefix: String,

    /// Upstream address (e.g., "127.0.0.1:3000").
    pub address: String,

    /// Route priority (higher = checked first).
    #[serde(default)]
    pub priority: u32,
}

/// Landing page content.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LandingConfig {
    /// Document title.
    pub title: String,

    /// Header title.
    pub heading: String,

    /// Small line under the header title.
    pub version_label: String,

    /// Module cards, in display order.
    pub cards: Vec<CardConfig>,
}

impl Default for LandingConfig {
    fn default() -> Self {
        Self {
            title: "HJM - Sistema Hospitalario".to_string(),
            heading: "Portal de Acceso HJM".to_string(),
            version_label: "Versión 1.0".to_string(),
            cards: vec![
                CardConfig {
                    label: "Atención al Usuario".to_string(),
                    code: "MAU".to_string(),
                    description: "Gestión de pacientes, recetas médicas y atención hospitalaria"
                        .to_string(),
                    url: "/mau".to_string(),
                    accent: "blue".to_string(),
                },
                CardConfig {
                    label: "Módulo de Informes".to_string(),
                    code: "CAGPU".to_string(),
                    description: "Reportes, análisis estadísticos y métricas del sistema"
                        .to_string(),
                    url: "/cagpu".to_string(),
                    accent: "green".to_string(),
                },
            ],
        }
    }
}

/// A module card on the landing page.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CardConfig {
    pub label: String,
    pub code: String,
    pub description: String,
    /// Destination opened in a new browsing context.
    pub url: String,
    /// Tailwind colour family for the card accents.
    #[serde(default = "default_accent")]
    pub accent: String,
}

fn default_accent() -> String {
    "blue".to_string()
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format: "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_uses_defaults() {
        let config: PortalConfig = toml::from_str(
            r#"
            [auth]
            jwt_secret = "s3cret"

            [[upstreams]]
            name = "cagpu"
            path_prefix = "/cagpu"
            address = "127.0.0.1:3001"
            "#,
        )
        .unwrap();

        assert_eq!(config.gate.base_path, "/cagpu");
        assert_eq!(config.gate.cookie_name, "auth");
        assert_eq!(config.auth.jwt_secret, "s3cret");
        assert_eq!(config.rate_limit.login.max_requests, 5);
        assert_eq!(config.upstreams.len(), 1);
        assert_eq!(config.upstreams[0].priority, 0);
        assert_eq!(config.landing.cards.len(), 2);
        assert_eq!(config.gate.asset_extensions.len(), 9);
    }

    #[test]
    fn limiter_enabled_defaults_to_true() {
        let config: PortalConfig = toml::from_str(
            r#"
            [rate_limit.api]
            max_requests = 10
            window_secs = 1
            "#,
        )
        .unwrap();

        assert!(config.rate_limit.api.enabled);
        assert_eq!(config.rate_limit.api.max_requests, 10);
        // Untouched sibling keeps its default.
        assert_eq!(config.rate_limit.login.window_secs, 900);
    }

    #[test]
    fn sample_config_matches_defaults() {
        let config: PortalConfig = toml::from_str(include_str!("../../portal.toml")).unwrap();
        let defaults = PortalConfig::default();

        assert_eq!(config.gate.public_paths, defaults.gate.public_paths);
        assert_eq!(config.gate.asset_extensions, defaults.gate.asset_extensions);
        assert_eq!(config.rate_limit.api.max_requests, defaults.rate_limit.api.max_requests);
        assert_eq!(config.security.max_body_size, defaults.security.max_body_size);
        assert_eq!(config.landing.cards.len(), 2);
        assert_eq!(config.upstreams.len(), 2);
    }
}
