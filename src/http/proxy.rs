//! Upstream forwarding.
//!
//! # Responsibilities
//! - Rewrite the request URI to the chosen upstream
//! - Strip hop-by-hop headers in both directions
//! - Map forwarding failures to HTTP responses
//!
//! # Design Decisions
//! - Bodies are streamed, never buffered
//! - No retries: a failed forward is a 502

use std::net::SocketAddr;
use std::str::FromStr;

use axum::{
    body::Body,
    extract::Request,
    http::{
        uri::{Authority, PathAndQuery, Scheme},
        StatusCode, Uri, Version,
    },
    response::{IntoResponse, Response},
    Json,
};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use serde_json::json;
use thiserror::Error;

use crate::security::headers::{prepare_forwarded, strip_hop_by_hop};

/// Pooled HTTP/1.1 client shared by all requests.
pub type HttpClient = Client<HttpConnector, Body>;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("no upstream serves {0}")]
    NoUpstream(String),

    #[error("cannot build upstream URI for {0}")]
    InvalidUri(SocketAddr),

    #[error("upstream {upstream} failed: {source}")]
    Upstream {
        upstream: String,
        #[source]
        source: hyper_util::client::legacy::Error,
    },
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ProxyError::NoUpstream(_) => (StatusCode::NOT_FOUND, "No upstream for this path"),
            ProxyError::InvalidUri(_) | ProxyError::Upstream { .. } => {
                (StatusCode::BAD_GATEWAY, "Upstream request failed")
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Point `uri` at `addr`, keeping path and query.
pub fn upstream_uri(uri: &Uri, addr: SocketAddr) -> Result<Uri, ProxyError> {
    let mut parts = uri.clone().into_parts();
    parts.scheme = Some(Scheme::HTTP);
    parts.authority =
        Some(Authority::from_str(&addr.to_string()).map_err(|_| ProxyError::InvalidUri(addr))?);
    if parts.path_and_query.is_none() {
        parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    Uri::from_parts(parts).map_err(|_| ProxyError::InvalidUri(addr))
}

/// Forward `request` to the upstream `name` at `addr`.
pub async fn forward(
    client: &HttpClient,
    name: &str,
    addr: SocketAddr,
    peer: Option<SocketAddr>,
    request: Request,
) -> Result<Response, ProxyError> {
    let (mut parts, body) = request.into_parts();
    parts.uri = upstream_uri(&parts.uri, addr)?;
    parts.version = Version::HTTP_11;
    prepare_forwarded(&mut parts.headers, peer);

    let response = client
        .request(Request::from_parts(parts, body))
        .await
        .map_err(|source| ProxyError::Upstream {
            upstream: name.to_string(),
            source,
        })?;

    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Ok(Response::from_parts(parts, Body::new(body)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_keeps_path_and_query() {
        let uri: Uri = "/cagpu/api/informes?desde=2025-01-01".parse().unwrap();
        let addr: SocketAddr = "127.0.0.1:3001".parse().unwrap();
        assert_eq!(
            upstream_uri(&uri, addr).unwrap().to_string(),
            "http://127.0.0.1:3001/cagpu/api/informes?desde=2025-01-01"
        );
    }

    #[test]
    fn absolute_uri_is_redirected_to_upstream() {
        let uri: Uri = "http://portal.example/mau".parse().unwrap();
        let addr: SocketAddr = "10.1.0.5:3000".parse().unwrap();
        assert_eq!(
            upstream_uri(&uri, addr).unwrap().to_string(),
            "http://10.1.0.5:3000/mau"
        );
    }

    #[test]
    fn error_statuses() {
        assert_eq!(
            ProxyError::NoUpstream("/x".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        assert_eq!(
            ProxyError::InvalidUri(addr).into_response().status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
