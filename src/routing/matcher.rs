//! Path matching logic.
//!
//! # Responsibilities
//! - Match path prefixes and exact paths (case-sensitive)
//! - Match whole-segment prefixes for upstream lookup
//! - Match file extensions (case-insensitive)
//! - Combine conditions with AND / OR / NOT semantics
//!
//! # Design Decisions
//! - Matchers see a bare path, never a request, so the gate policy can be
//!   evaluated without the HTTP runtime
//! - No regex to guarantee O(n) matching
//! - Empty AND = always matches, empty OR = never matches

use std::fmt::Debug;

/// Trait for matching paths against conditions.
pub trait Matcher: Send + Sync + Debug {
    /// Returns true if the path matches this condition.
    fn matches(&self, path: &str) -> bool;
}

/// Matches a path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }
}

/// Matches a prefix only at a segment boundary: `/cagpu` matches `/cagpu`
/// and `/cagpu/x` but not `/cagpuX` or `/cagpu.admin`.
#[derive(Debug, Clone)]
pub struct SegmentPrefixMatcher {
    prefix: String,
}

impl SegmentPrefixMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Matcher for SegmentPrefixMatcher {
    fn matches(&self, path: &str) -> bool {
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => self.prefix.ends_with('/') || rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

/// Matches one path exactly.
#[derive(Debug, Clone)]
pub struct ExactPathMatcher {
    path: String,
}

impl ExactPathMatcher {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Matcher for ExactPathMatcher {
    fn matches(&self, path: &str) -> bool {
        path == self.path
    }
}

/// Matches paths ending in one of a set of file extensions.
#[derive(Debug, Clone)]
pub struct ExtensionMatcher {
    /// Lowercase, with the leading dot.
    suffixes: Vec<String>,
}

impl ExtensionMatcher {
    /// Extensions are given without the dot; matching ignores ASCII case.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            suffixes: extensions
                .into_iter()
                .map(|e| format!(".{}", e.as_ref().trim_start_matches('.').to_ascii_lowercase()))
                .collect(),
        }
    }
}

impl Matcher for ExtensionMatcher {
    fn matches(&self, path: &str) -> bool {
        let bytes = path.as_bytes();
        self.suffixes.iter().any(|suffix| {
            bytes.len() >= suffix.len()
                && bytes[bytes.len() - suffix.len()..].eq_ignore_ascii_case(suffix.as_bytes())
        })
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, path: &str) -> bool {
        self.matchers.iter().all(|m| m.matches(path))
    }
}

/// Combines multiple matchers with OR semantics.
#[derive(Debug)]
pub struct AnyMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AnyMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for AnyMatcher {
    fn matches(&self, path: &str) -> bool {
        self.matchers.iter().any(|m| m.matches(path))
    }
}

/// Inverts a matcher.
#[derive(Debug)]
pub struct NotMatcher {
    inner: Box<dyn Matcher>,
}

impl NotMatcher {
    pub fn new(inner: Box<dyn Matcher>) -> Self {
        Self { inner }
    }
}

impl Matcher for NotMatcher {
    fn matches(&self, path: &str) -> bool {
        !self.inner.matches(path)
    }
}

/// Shorthand for a boxed prefix matcher.
pub fn prefix(p: impl Into<String>) -> Box<dyn Matcher> {
    Box::new(PathPrefixMatcher::new(p))
}

/// Shorthand for a boxed OR over several prefixes.
pub fn any_prefix<I, S>(prefixes: I) -> Box<dyn Matcher>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Box::new(AnyMatcher::new(prefixes.into_iter().map(prefix).collect()))
}
