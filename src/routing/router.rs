//! Upstream lookup.
//!
//! # Responsibilities
//! - Store compiled upstream routes
//! - Look up the upstream for a request path
//! - Return matched upstream or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) path prefix scan (acceptable for typical route counts)
//! - Prefixes match whole segments only (`/cagpu` never serves `/cagpuX`)
//! - Ordered by priority, then by prefix length (most specific wins)
//! - Explicit None rather than silent default

use std::net::SocketAddr;

use crate::config::UpstreamConfig;
use crate::routing::matcher::{Matcher, SegmentPrefixMatcher};

/// A compiled upstream route.
#[derive(Debug)]
pub struct Upstream {
    pub name: String,
    pub addr: SocketAddr,
    prefix_len: usize,
    priority: u32,
    matcher: SegmentPrefixMatcher,
}

/// Maps request paths to upstream sub-applications.
#[derive(Debug, Default)]
pub struct UpstreamRouter {
    routes: Vec<Upstream>,
}

impl UpstreamRouter {
    /// Compile routes from configuration. Entries with unparsable addresses are skipped.
    pub fn from_config(configs: &[UpstreamConfig]) -> Self {
        let mut routes: Vec<Upstream> = configs
            .iter()
            .filter_map(|c| match c.address.parse() {
                Ok(addr) => Some(Upstream {
                    name: c.name.clone(),
                    addr,
                    prefix_len: c.path_prefix.len(),
                    priority: c.priority,
                    matcher: SegmentPrefixMatcher::new(c.path_prefix.clone()),
                }),
                Err(_) => {
                    tracing::warn!(upstream = %c.name, address = %c.address, "Invalid upstream address");
                    None
                }
            })
            .collect();

        routes.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.prefix_len.cmp(&a.prefix_len))
        });

        Self { routes }
    }

    /// Find the upstream serving `path`.
    pub fn match_path(&self, path: &str) -> Option<&Upstream> {
        self.routes.iter().find(|r| r.matcher.matches(path))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream(name: &str, prefix: &str, port: u16, priority: u32) -> UpstreamConfig {
        UpstreamConfig {
            name: name.into(),
            path_prefix: prefix.into(),
            address: format!("127.0.0.1:{}", port),
            priority,
        }
    }

    #[test]
    fn longest_prefix_wins_at_equal_priority() {
        let router = UpstreamRouter::from_config(&[
            upstream("catch-all", "/", 3000, 0),
            upstream("cagpu", "/cagpu", 3001, 0),
            upstream("mau", "/mau", 3002, 0),
        ]);

        assert_eq!(router.match_path("/cagpu/api/reports").unwrap().name, "cagpu");
        assert_eq!(router.match_path("/mau").unwrap().name, "mau");
        assert_eq!(router.match_path("/other").unwrap().name, "catch-all");
    }

    #[test]
    fn priority_beats_specificity() {
        let router = UpstreamRouter::from_config(&[
            upstream("cagpu", "/cagpu", 3001, 0),
            upstream("maintenance", "/", 3009, 10),
        ]);
        assert_eq!(router.match_path("/cagpu/login").unwrap().name, "maintenance");
    }

    #[test]
    fn lookalike_prefix_is_not_routed() {
        let router = UpstreamRouter::from_config(&[
            upstream("cagpu", "/cagpu", 3001, 0),
            upstream("mau", "/mau", 3002, 0),
        ]);
        assert_eq!(router.match_path("/cagpu").unwrap().name, "cagpu");
        for path in ["/cagpuX/dashboard", "/cagpu%2Fapi/reportes", "/cagpu.admin", "/maux"] {
            assert!(router.match_path(path).is_none(), "{path}");
        }
    }

    #[test]
    fn no_match_and_bad_address() {
        let mut bad = upstream("bad", "/bad", 1, 0);
        bad.address = "nowhere".into();
        let router = UpstreamRouter::from_config(&[upstream("cagpu", "/cagpu", 3001, 0), bad]);

        assert_eq!(router.len(), 1);
        assert!(router.match_path("/mau").is_none());
        assert!(router.match_path("/bad").is_none());
    }
}
