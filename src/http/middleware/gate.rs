//! Axum adapter for the request gate.
//!
//! Extracts the path, session cookie and client key from the request, asks
//! the [`Gate`](crate::gate::Gate) for a decision and either short-circuits
//! with the decision's response or forwards with identity headers injected.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use crate::gate::{Decision, GateRequest};
use crate::http::request::{peer_addr, request_id};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::headers::{client_key, strip_identity};

pub async fn gate_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    // Identity headers are only ever set below, from a verified token.
    strip_identity(request.headers_mut());

    let live = state.live.load_full();
    let gate = &live.gate;
    let path = request.uri().path().to_owned();
    if !gate.covers(&path) {
        return next.run(request).await;
    }

    let client = client_key(request.headers(), peer_addr(&request), gate.trust_forwarded_for());
    let jar = CookieJar::from_headers(request.headers());
    let token = jar.get(gate.cookie_name()).map(|c| c.value().to_owned());

    let decision = gate
        .decide(GateRequest {
            path: &path,
            token: token.as_deref(),
            client: &client,
        })
        .await;

    let outcome = decision.outcome();
    metrics::record_gate_decision(outcome);
    if matches!(decision, Decision::Unauthorized(_)) {
        tracing::warn!(
            request_id = %request_id(&request),
            path = %path,
            client = %client,
            outcome,
            "Request refused"
        );
    } else {
        tracing::debug!(request_id = %request_id(&request), path = %path, outcome, "Gate decision");
    }

    match decision.resolve() {
        Ok(identity) => {
            if let Some(identity) = identity {
                identity.inject(request.headers_mut());
            }
            next.run(request).await
        }
        Err(response) => response,
    }
}
