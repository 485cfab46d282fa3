//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, limits, request ID, gate)
//! - Bind server to listener
//! - Serve the landing page and health endpoint
//! - Forward everything else to the upstream sub-applications
//! - Swap in rebuilt state on configuration reload
//! - Prune idle rate limit buckets in the background

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{Request, State},
    http::Request as HttpRequest,
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::PortalConfig;
use crate::gate::Gate;
use crate::http::middleware::gate_middleware;
use crate::http::proxy::{self, HttpClient, ProxyError};
use crate::http::request::{
    peer_addr, propagate_request_id_layer, request_id, set_request_id_layer,
};
use crate::landing::{LandingError, LandingPage};
use crate::lifecycle::{shutdown, Shutdown};
use crate::observability::metrics;
use crate::routing::UpstreamRouter;
use crate::security::rate_limit::TokenBucketLimiter;

/// Everything rebuilt from configuration on reload.
#[derive(Debug)]
pub struct LiveState {
    pub gate: Gate,
    pub upstreams: UpstreamRouter,
    pub landing: LandingPage,
    limiters: Vec<Arc<TokenBucketLimiter>>,
    bucket_idle: Duration,
}

impl LiveState {
    pub fn build(config: &PortalConfig) -> Result<Self, LandingError> {
        let landing = LandingPage::render(&config.landing)?;
        let (gate, limiters) = Gate::from_config(config);
        Ok(Self {
            gate,
            upstreams: UpstreamRouter::from_config(&config.upstreams),
            landing,
            limiters,
            bucket_idle: Duration::from_secs(config.rate_limit.idle_secs),
        })
    }

    /// Prune every limiter; returns the number of buckets dropped.
    pub fn prune_limiters(&self) -> usize {
        self.limiters
            .iter()
            .map(|limiter| limiter.prune(self.bucket_idle))
            .sum()
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub live: Arc<ArcSwap<LiveState>>,
    pub client: HttpClient,
}

/// HTTP server for the portal.
pub struct HttpServer {
    router: Router,
    config: PortalConfig,
    live: Arc<ArcSwap<LiveState>>,
    updates: Option<mpsc::UnboundedReceiver<PortalConfig>>,
}

impl HttpServer {
    pub fn new(config: PortalConfig) -> Result<Self, LandingError> {
        let live = Arc::new(ArcSwap::from_pointee(LiveState::build(&config)?));

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let state = AppState {
            live: live.clone(),
            client,
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            live,
            updates: None,
        })
    }

    /// Apply configurations received on `updates` while running.
    ///
    /// Listener, timeout and body limit settings only take effect on restart.
    pub fn with_config_updates(mut self, updates: mpsc::UnboundedReceiver<PortalConfig>) -> Self {
        self.updates = Some(updates);
        self
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(config: &PortalConfig, state: AppState) -> Router {
        Router::new()
            .route("/", get(landing_handler))
            .route("/healthz", get(health_handler))
            .fallback(proxy_handler)
            .layer(middleware::from_fn_with_state(state.clone(), gate_middleware))
            .layer(middleware::from_fn(track_metrics))
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &HttpRequest<Body>| {
                tracing::info_span!(
                    "request",
                    request_id = %request_id(request),
                    method = %request.method(),
                    path = %request.uri().path()
                )
            }))
            .layer(set_request_id_layer())
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: &Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstreams = self.live.load().upstreams.len(),
            base_path = %self.config.gate.base_path,
            "HTTP server starting"
        );

        let prune_every = Duration::from_secs(self.config.rate_limit.prune_interval_secs.max(1));
        tokio::spawn(prune_buckets(self.live.clone(), prune_every, shutdown.subscribe()));

        if let Some(updates) = self.updates {
            tokio::spawn(apply_updates(self.live.clone(), updates, shutdown.subscribe()));
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown::wait(shutdown.subscribe()))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }
}

async fn landing_handler(State(state): State<AppState>) -> Html<String> {
    Html(state.live.load().landing.html().to_owned())
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Forward a request the gate let through.
async fn proxy_handler(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, ProxyError> {
    let (name, addr) = {
        let live = state.live.load();
        let path = request.uri().path();
        match live.upstreams.match_path(path) {
            Some(upstream) => (upstream.name.clone(), upstream.addr),
            None => {
                tracing::warn!(request_id = %request_id(&request), path = %path, "No upstream matched");
                return Err(ProxyError::NoUpstream(path.to_owned()));
            }
        }
    };

    let peer = peer_addr(&request);
    let request_id = request_id(&request).to_owned();
    tracing::debug!(request_id = %request_id, upstream = %name, "Forwarding request");

    proxy::forward(&state.client, &name, addr, peer, request)
        .await
        .inspect_err(|e| {
            tracing::error!(request_id = %request_id, upstream = %name, error = %e, "Upstream error");
            metrics::record_upstream_error(&name);
        })
}

async fn track_metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let response = next.run(request).await;
    metrics::record_request(method.as_str(), response.status().as_u16(), start);
    response
}

async fn prune_buckets(
    live: Arc<ArcSwap<LiveState>>,
    every: Duration,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(every);
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = live.load().prune_limiters();
                if removed > 0 {
                    tracing::debug!(removed, "Pruned idle rate limit buckets");
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}

async fn apply_updates(
    live: Arc<ArcSwap<LiveState>>,
    mut updates: mpsc::UnboundedReceiver<PortalConfig>,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(config) = update else { break };
                match LiveState::build(&config) {
                    Ok(state) => {
                        live.store(Arc::new(state));
                        tracing::info!(
                            base_path = %config.gate.base_path,
                            upstreams = config.upstreams.len(),
                            "Configuration reloaded"
                        );
                    }
                    Err(e) => tracing::error!(error = %e, "Reloaded configuration rejected"),
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, StatusCode};
    use tower::ServiceExt;

    fn router() -> Router {
        let mut config = PortalConfig::default();
        config.auth.jwt_secret = "router-test".into();
        let server = HttpServer::new(config).unwrap();
        server.router
    }

    async fn get(router: Router, uri: &str) -> Response {
        router
            .oneshot(HttpRequest::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn json(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn healthz_is_never_gated() {
        let response = get(router(), "/healthz").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn landing_page_at_root() {
        let response = get(router(), "/").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("Portal de Acceso HJM"));
    }

    #[tokio::test]
    async fn gate_runs_before_upstream_lookup() {
        let response = get(router(), "/cagpu/informes").await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.headers()[header::LOCATION], "/cagpu/login");

        let response = get(router(), "/cagpu/api/reportes").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn passed_request_without_upstream_is_404() {
        let response = get(router(), "/cagpu/login").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let mut config = PortalConfig::default();
        config.auth.jwt_secret = "router-test".into();
        config.security.max_body_size = 8;
        let router = HttpServer::new(config).unwrap().router;

        let request = HttpRequest::post("/mau/api/formulario")
            .header(header::CONTENT_LENGTH, "32")
            .body(Body::from(vec![b'x'; 32]))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn live_state_prunes_nothing_when_fresh() {
        let mut config = PortalConfig::default();
        config.auth.jwt_secret = "router-test".into();
        let state = LiveState::build(&config).unwrap();
        assert_eq!(state.prune_limiters(), 0);
        assert_eq!(state.limiters.len(), 2);
    }
}
