//! Request gate for the protected sub-application.
//!
//! # Data Flow
//! ```text
//! GateRequest { path, token, client }
//!     → outside base path? → Forward (no side effects)
//!     → inner path (prefix stripped, "" → "/")
//!     → policy.rs (ordered rules → Plan)
//!     → limiter (login or API), rejection returned as is
//!     → verifier (JWT over shared secret)
//!     → decision.rs (Forward / Redirect / 401 / 429)
//! ```
//!
//! # Design Decisions
//! - Stateless per request; limiter and verifier are injected collaborators
//! - Decisions never depend on axum types, so the policy is testable alone
//! - Verification failures are terminal, never retried

pub mod decision;
pub mod policy;

use std::sync::Arc;

use crate::auth::{JwtVerifier, TokenVerifier};
use crate::config::{GateConfig, LimiterConfig, PortalConfig};
use crate::observability::metrics;
use crate::security::rate_limit::{
    AllowAll, RateLimitVerdict, RateLimiter, TokenBucketLimiter,
};

pub use decision::{AuthFailure, Decision, Identity, TOKEN_INVALID_MESSAGE, TOKEN_REQUIRED_MESSAGE};
pub use policy::{Action, Audience, LimiterKind, Plan, RoutePolicy};

/// The inputs the gate looks at.
#[derive(Debug, Clone, Copy)]
pub struct GateRequest<'a> {
    /// Full request path, including the base prefix.
    pub path: &'a str,
    /// Value of the session cookie, if present.
    pub token: Option<&'a str>,
    /// Rate limiting key of the caller.
    pub client: &'a str,
}

/// The request gate.
pub struct Gate {
    base_path: String,
    login_location: String,
    cookie_name: String,
    trust_forwarded_for: bool,
    policy: RoutePolicy,
    verifier: Arc<dyn TokenVerifier>,
    login_limiter: Arc<dyn RateLimiter>,
    api_limiter: Arc<dyn RateLimiter>,
}

impl Gate {
    pub fn new(
        config: &GateConfig,
        verifier: Arc<dyn TokenVerifier>,
        login_limiter: Arc<dyn RateLimiter>,
        api_limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        let base_path = config.base_path.trim_end_matches('/').to_string();
        Self {
            login_location: format!("{}{}", base_path, config.login_path),
            base_path,
            cookie_name: config.cookie_name.clone(),
            trust_forwarded_for: config.trust_forwarded_for,
            policy: RoutePolicy::from_config(config),
            verifier,
            login_limiter,
            api_limiter,
        }
    }

    /// Build the gate with the production JWT verifier and token bucket limiters.
    ///
    /// The limiters are returned as well so the caller can prune them.
    pub fn from_config(config: &PortalConfig) -> (Self, Vec<Arc<TokenBucketLimiter>>) {
        let verifier = Arc::new(JwtVerifier::from_config(&config.auth));
        let mut buckets = Vec::new();
        let login = build_limiter("login", &config.rate_limit.login, &mut buckets);
        let api = build_limiter("api", &config.rate_limit.api, &mut buckets);

        (Self::new(&config.gate, verifier, login, api), buckets)
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn trust_forwarded_for(&self) -> bool {
        self.trust_forwarded_for
    }

    /// Whether `path` is under the gate's jurisdiction.
    ///
    /// Plain string prefix: `/cagpuX` and `/cagpu.admin` are gated too and
    /// fall through to page authentication.
    pub fn covers(&self, path: &str) -> bool {
        path.starts_with(self.base_path.as_str())
    }

    /// `path` with the base prefix removed; empty becomes "/".
    fn inner_path<'p>(&self, path: &'p str) -> Option<&'p str> {
        if !self.covers(path) {
            return None;
        }
        let rest = &path[self.base_path.len()..];
        Some(if rest.is_empty() { "/" } else { rest })
    }

    /// Decide what happens to a request.
    pub async fn decide(&self, request: GateRequest<'_>) -> Decision {
        let inner = match self.inner_path(request.path) {
            Some(inner) => inner,
            None => return Decision::pass(),
        };

        let plan = self.policy.plan(inner);

        if let Some(kind) = plan.throttle {
            let limiter = match kind {
                LimiterKind::Login => &self.login_limiter,
                LimiterKind::Api => &self.api_limiter,
            };
            if let RateLimitVerdict::Reject(rejection) = limiter.check(request.client).await {
                tracing::warn!(
                    client = %request.client,
                    limiter = rejection.limiter,
                    path = %request.path,
                    retry_after_secs = rejection.retry_after_secs(),
                    "Rate limit exceeded"
                );
                metrics::record_rate_limited(rejection.limiter);
                return Decision::TooManyRequests(rejection);
            }
        }

        match plan.access {
            Action::Bypass | Action::Public => Decision::pass(),
            Action::RedirectToLogin => self.redirect(),
            Action::Authenticate(audience) => self.authenticate(request, audience).await,
            // Throttle never ends a plan.
            Action::Throttle(_) => Decision::pass(),
        }
    }

    async fn authenticate(&self, request: GateRequest<'_>, audience: Audience) -> Decision {
        let token = match request.token {
            Some(token) => token,
            None => {
                return match audience {
                    Audience::Api => Decision::Unauthorized(AuthFailure::MissingToken),
                    Audience::Page => self.redirect(),
                };
            }
        };

        let verified = self
            .verifier
            .verify(token)
            .await
            .and_then(|claims| Identity::from_claims(&claims));

        match verified {
            Ok(identity) => Decision::Forward {
                identity: Some(identity),
            },
            Err(e) => {
                tracing::debug!(path = %request.path, error = %e, "Session token rejected");
                match audience {
                    Audience::Api => Decision::Unauthorized(AuthFailure::InvalidToken(e)),
                    Audience::Page => self.redirect(),
                }
            }
        }
    }

    fn redirect(&self) -> Decision {
        Decision::RedirectToLogin {
            location: self.login_location.clone(),
        }
    }
}

fn build_limiter(
    name: &'static str,
    config: &LimiterConfig,
    buckets: &mut Vec<Arc<TokenBucketLimiter>>,
) -> Arc<dyn RateLimiter> {
    if !config.enabled {
        return Arc::new(AllowAll);
    }
    let limiter = Arc::new(TokenBucketLimiter::from_config(name, config));
    buckets.push(limiter.clone());
    limiter
}

impl std::fmt::Debug for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate")
            .field("base_path", &self.base_path)
            .field("cookie_name", &self.cookie_name)
            .field("rules", &self.policy.rules().len())
            .finish_non_exhaustive()
    }
}
