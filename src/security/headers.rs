//! Header manipulation.
//!
//! # Responsibilities
//! - Derive the client key used by the rate limiters
//! - Strip caller-supplied identity headers before the gate decides
//! - Strip hop-by-hop headers and add X-Forwarded-* before forwarding
//!
//! # Design Decisions
//! - Preserve original client IP in X-Forwarded-For
//! - Only trust an incoming X-Forwarded-For when configured to
//! - Identity headers are only ever set by the gate

use std::net::SocketAddr;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

/// Subject of the verified session token.
pub const X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");
/// Role of the verified session token.
pub const X_USER_ROLE: HeaderName = HeaderName::from_static("x-user-role");

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Key used when neither the peer nor a forwarded address is known.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Headers that only apply to a single connection and must not be forwarded.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Identify the client for rate limiting.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get(&X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(first) = forwarded {
            return first.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Remove identity headers a caller may have set themselves.
pub fn strip_identity(headers: &mut HeaderMap) {
    headers.remove(&X_USER_ID);
    headers.remove(&X_USER_ROLE);
}

/// Prepare request headers for the upstream hop.
pub fn prepare_forwarded(headers: &mut HeaderMap, peer: Option<SocketAddr>) {
    // Headers named by Connection are hop-by-hop too.
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }

    if let Some(peer) = peer {
        let ip = peer.ip().to_string();
        let value = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(existing) => format!("{}, {}", existing, ip),
            None => ip,
        };
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }

    if let Some(host) = headers.get(header::HOST).cloned() {
        headers.insert(X_FORWARDED_HOST, host);
    }
    headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));
}

/// Strip hop-by-hop headers from an upstream response.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
}
