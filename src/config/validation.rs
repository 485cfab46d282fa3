//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate path shapes (base path, gate segments, upstream prefixes)
//! - Validate value ranges (limits > 0, timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PortalConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{LimiterConfig, PortalConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: must start with '/' (got {value:?})")]
    MissingLeadingSlash { field: String, value: String },

    #[error("gate.base_path: must not end with '/' (got {0:?})")]
    TrailingSlash(String),

    #[error("{0}: must not be empty")]
    Empty(String),

    #[error("{0}: must be greater than zero")]
    Zero(String),

    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: String, value: String },

    #[error("upstreams: duplicate name {0:?}")]
    DuplicateUpstream(String),

    #[error("observability.log_format: unknown format {0:?} (expected \"pretty\" or \"json\")")]
    LogFormat(String),
}

/// Validate a parsed configuration, collecting every error.
pub fn validate_config(config: &PortalConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address("listener.bind_address", &config.listener.bind_address, &mut errors);

    // Gate
    let gate = &config.gate;
    if gate.base_path.is_empty() {
        errors.push(ValidationError::Empty("gate.base_path".into()));
    } else {
        check_path("gate.base_path", &gate.base_path, &mut errors);
        if gate.base_path.len() > 1 && gate.base_path.ends_with('/') {
            errors.push(ValidationError::TrailingSlash(gate.base_path.clone()));
        }
    }
    if gate.cookie_name.trim().is_empty() {
        errors.push(ValidationError::Empty("gate.cookie_name".into()));
    }
    check_path("gate.login_path", &gate.login_path, &mut errors);
    check_path("gate.api_prefix", &gate.api_prefix, &mut errors);
    check_path("gate.auth_api_prefix", &gate.auth_api_prefix, &mut errors);
    check_path("gate.login_submit_path", &gate.login_submit_path, &mut errors);
    check_path("gate.ping_path", &gate.ping_path, &mut errors);
    for (i, p) in gate.public_paths.iter().enumerate() {
        check_path(&format!("gate.public_paths[{}]", i), p, &mut errors);
    }
    for (i, p) in gate.asset_prefixes.iter().enumerate() {
        check_path(&format!("gate.asset_prefixes[{}]", i), p, &mut errors);
    }

    if config.auth.jwt_secret.is_empty() {
        errors.push(ValidationError::Empty("auth.jwt_secret".into()));
    }

    check_limiter("rate_limit.login", &config.rate_limit.login, &mut errors);
    check_limiter("rate_limit.api", &config.rate_limit.api, &mut errors);
    if config.rate_limit.prune_interval_secs == 0 {
        errors.push(ValidationError::Zero("rate_limit.prune_interval_secs".into()));
    }

    let mut names = std::collections::HashSet::new();
    for (i, upstream) in config.upstreams.iter().enumerate() {
        if !names.insert(upstream.name.as_str()) {
            errors.push(ValidationError::DuplicateUpstream(upstream.name.clone()));
        }
        check_path(&format!("upstreams[{}].path_prefix", i), &upstream.path_prefix, &mut errors);
        check_address(&format!("upstreams[{}].address", i), &upstream.address, &mut errors);
    }

    for (i, card) in config.landing.cards.iter().enumerate() {
        if card.url.trim().is_empty() {
            errors.push(ValidationError::Empty(format!("landing.cards[{}].url", i)));
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.request_secs".into()));
    }
    if config.security.max_body_size == 0 {
        errors.push(ValidationError::Zero("security.max_body_size".into()));
    }

    let obs = &config.observability;
    if obs.log_format != "pretty" && obs.log_format != "json" {
        errors.push(ValidationError::LogFormat(obs.log_format.clone()));
    }
    if obs.metrics_enabled {
        check_address("observability.metrics_address", &obs.metrics_address, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_path(field: &str, value: &str, errors: &mut Vec<ValidationError>) {
    if !value.starts_with('/') {
        errors.push(ValidationError::MissingLeadingSlash {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
}

fn check_address(field: &str, value: &str, errors: &mut Vec<ValidationError>) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
}

fn check_limiter(field: &str, limiter: &LimiterConfig, errors: &mut Vec<ValidationError>) {
    if !limiter.enabled {
        return;
    }
    if limiter.max_requests == 0 {
        errors.push(ValidationError::Zero(format!("{}.max_requests", field)));
    }
    if limiter.window_secs == 0 {
        errors.push(ValidationError::Zero(format!("{}.window_secs", field)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> PortalConfig {
        let mut config = PortalConfig::default();
        config.auth.jwt_secret = "secret".into();
        config
    }

    #[test]
    fn default_with_secret_is_valid() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn missing_secret_is_rejected() {
        let errors = validate_config(&PortalConfig::default()).unwrap_err();
        assert_eq!(errors, vec![ValidationError::Empty("auth.jwt_secret".into())]);
    }

    #[test]
    fn base_path_shape_is_checked() {
        let mut config = valid();
        config.gate.base_path = "cagpu/".into();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::MissingLeadingSlash {
            field: "gate.base_path".into(),
            value: "cagpu/".into(),
        }));
        assert!(errors.contains(&ValidationError::TrailingSlash("cagpu/".into())));
    }

    #[test]
    fn collects_every_error() {
        let mut config = valid();
        config.rate_limit.login.max_requests = 0;
        config.rate_limit.api.window_secs = 0;
        config.listener.bind_address = "not-an-address".into();
        config.observability.log_format = "xml".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::Zero("rate_limit.login.max_requests".into())));
        assert!(errors.contains(&ValidationError::Zero("rate_limit.api.window_secs".into())));
    }

    #[test]
    fn disabled_limiter_is_not_checked() {
        let mut config = valid();
        config.rate_limit.api.enabled = false;
        config.rate_limit.api.max_requests = 0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn duplicate_upstreams_are_rejected() {
        let mut config = valid();
        for _ in 0..2 {
            config.upstreams.push(crate::config::UpstreamConfig {
                name: "cagpu".into(),
                path_prefix: "/cagpu".into(),
                address: "127.0.0.1:3001".into(),
                priority: 0,
            });
        }
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::DuplicateUpstream("cagpu".into())]);
    }
}
