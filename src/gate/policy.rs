//! Ordered route policy for the gate.
//!
//! The policy is a list of `(matcher, action)` rules evaluated top to bottom
//! against the inner path. Terminal actions end evaluation; `Throttle` is a
//! checkpoint that consults a limiter and lets evaluation continue. Only the
//! first matching throttle rule is applied. When no terminal rule matches the
//! page fallback applies.
//!
//! ```text
//! asset          → Bypass
//! "/"            → RedirectToLogin
//! login submit   → Throttle(Login)
//! private API    → Throttle(Api)
//! public pages   → Public
//! API            → Authenticate(Api)
//! (fallback)     → Authenticate(Page)
//! ```

use crate::config::GateConfig;
use crate::routing::matcher::{
    any_prefix, prefix, AndMatcher, AnyMatcher, ExactPathMatcher, ExtensionMatcher, Matcher,
    NotMatcher,
};

/// Which limiter a throttle rule consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimiterKind {
    Login,
    Api,
}

/// How an authentication failure is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Programmatic client: 401 with a JSON body.
    Api,
    /// Browser page: redirect to the login page.
    Page,
}

/// What a rule does when it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Forward untouched, no limiter and no cookie inspection.
    Bypass,
    /// Always send the browser to the login page.
    RedirectToLogin,
    /// Consult a limiter, then keep evaluating.
    Throttle(LimiterKind),
    /// Forward without authentication.
    Public,
    /// Require a valid session token.
    Authenticate(Audience),
}

impl Action {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Action::Throttle(_))
    }
}

/// A named policy rule.
#[derive(Debug)]
pub struct Rule {
    pub name: &'static str,
    pub matcher: Box<dyn Matcher>,
    pub action: Action,
}

/// The gate's ordered rule table.
#[derive(Debug)]
pub struct RoutePolicy {
    rules: Vec<Rule>,
    fallback: Action,
}

/// Result of walking the rule table for one inner path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    /// Limiter to consult before `access`, if any.
    pub throttle: Option<LimiterKind>,
    /// Terminal action.
    pub access: Action,
    /// Name of the rule that produced `access`.
    pub rule: &'static str,
}

impl RoutePolicy {
    pub fn new(rules: Vec<Rule>, fallback: Action) -> Self {
        Self { rules, fallback }
    }

    /// Build the standard portal policy from gate configuration.
    pub fn from_config(config: &GateConfig) -> Self {
        let asset = AnyMatcher::new(vec![
            any_prefix(config.asset_prefixes.iter().cloned()),
            Box::new(ExtensionMatcher::new(&config.asset_extensions)),
        ]);

        // Throttle exemption uses "/api/auth/" with the slash, so "/api/auth"
        // itself and "/api/authors" still count against the API limiter.
        let auth_api_dir = format!("{}/", config.auth_api_prefix.trim_end_matches('/'));
        let private_api = AndMatcher::new(vec![
            prefix(config.api_prefix.clone()),
            Box::new(NotMatcher::new(prefix(auth_api_dir))),
        ]);

        let mut public = vec![config.login_path.clone()];
        public.extend(config.public_paths.iter().cloned());
        public.push(config.auth_api_prefix.clone());
        public.push(config.ping_path.clone());

        let rules = vec![
            Rule {
                name: "asset",
                matcher: Box::new(asset),
                action: Action::Bypass,
            },
            Rule {
                name: "root",
                matcher: Box::new(ExactPathMatcher::new("/")),
                action: Action::RedirectToLogin,
            },
            Rule {
                name: "login-submit",
                matcher: prefix(config.login_submit_path.clone()),
                action: Action::Throttle(LimiterKind::Login),
            },
            Rule {
                name: "private-api-throttle",
                matcher: Box::new(private_api),
                action: Action::Throttle(LimiterKind::Api),
            },
            Rule {
                name: "public",
                matcher: any_prefix(public),
                action: Action::Public,
            },
            Rule {
                name: "api",
                matcher: prefix(config.api_prefix.clone()),
                action: Action::Authenticate(Audience::Api),
            },
        ];

        Self::new(rules, Action::Authenticate(Audience::Page))
    }

    /// Walk the rules for `inner_path`.
    pub fn plan(&self, inner_path: &str) -> Plan {
        let mut throttle = None;

        for rule in &self.rules {
            if !rule.matcher.matches(inner_path) {
                continue;
            }
            match rule.action {
                Action::Throttle(kind) => {
                    if throttle.is_none() {
                        throttle = Some(kind);
                    }
                }
                access => {
                    return Plan {
                        throttle,
                        access,
                        rule: rule.name,
                    }
                }
            }
        }

        Plan {
            throttle,
            access: self.fallback,
            rule: "fallback",
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RoutePolicy {
        RoutePolicy::from_config(&GateConfig::default())
    }

    fn plan(path: &str) -> (Option<LimiterKind>, Action) {
        let p = policy().plan(path);
        (p.throttle, p.access)
    }

    #[test]
    fn assets_bypass_everything() {
        assert_eq!(plan("/static/logo.png"), (None, Action::Bypass));
        assert_eq!(plan("/_next/chunks/app"), (None, Action::Bypass));
        assert_eq!(plan("/reports/export.CSS"), (None, Action::Bypass));
        // Extension wins even under the API prefix.
        assert_eq!(plan("/api/reports/chart.svg"), (None, Action::Bypass));
    }

    #[test]
    fn root_redirects() {
        assert_eq!(plan("/"), (None, Action::RedirectToLogin));
    }

    #[test]
    fn login_submit_is_throttled_then_public() {
        assert_eq!(
            plan("/api/auth/login"),
            (Some(LimiterKind::Login), Action::Public)
        );
        assert_eq!(plan("/api/auth/logout"), (None, Action::Public));
    }

    #[test]
    fn private_api_is_throttled_then_authenticated() {
        assert_eq!(
            plan("/api/reports"),
            (Some(LimiterKind::Api), Action::Authenticate(Audience::Api))
        );
    }

    #[test]
    fn auth_api_prefix_is_public_without_the_slash() {
        assert_eq!(plan("/api/authors"), (Some(LimiterKind::Api), Action::Public));
        assert_eq!(plan("/api/auth"), (Some(LimiterKind::Api), Action::Public));
    }

    #[test]
    fn ping_is_throttled_but_public() {
        assert_eq!(plan("/api/ping"), (Some(LimiterKind::Api), Action::Public));
    }

    #[test]
    fn public_pages() {
        assert_eq!(plan("/login"), (None, Action::Public));
        assert_eq!(plan("/documentacion/guia"), (None, Action::Public));
    }

    #[test]
    fn pages_fall_back_to_page_auth() {
        let p = policy().plan("/dashboard");
        assert_eq!(p.access, Action::Authenticate(Audience::Page));
        assert_eq!(p.throttle, None);
        assert_eq!(p.rule, "fallback");
    }

    #[test]
    fn two_throttle_checkpoints() {
        let policy = policy();
        let throttles = policy
            .rules()
            .iter()
            .filter(|r| !r.action.is_terminal())
            .count();
        assert_eq!(throttles, 2);
    }
}
