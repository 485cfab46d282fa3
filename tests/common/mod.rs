//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{extract::Request, Json, Router};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use hjm_portal::config::{PortalConfig, UpstreamConfig};
use hjm_portal::{HttpServer, Shutdown};

pub const SECRET: &str = "integration-test-secret";

/// Start an upstream that answers every request with a JSON echo of what it received.
pub async fn start_echo_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().fallback(echo);

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

async fn echo(request: Request) -> Json<Value> {
    let header = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    };
    Json(json!({
        "method": request.method().as_str(),
        "path": request.uri().path(),
        "query": request.uri().query(),
        "user_id": header("x-user-id"),
        "user_role": header("x-user-role"),
        "forwarded_for": header("x-forwarded-for"),
        "request_id": header("x-request-id"),
    }))
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Portal configuration routing both modules to `upstream`.
pub fn portal_config(upstream: SocketAddr) -> PortalConfig {
    let mut config = PortalConfig::default();
    config.auth.jwt_secret = SECRET.to_string();
    config.upstreams = vec![
        UpstreamConfig {
            name: "cagpu".into(),
            path_prefix: "/cagpu".into(),
            address: upstream.to_string(),
            priority: 0,
        },
        UpstreamConfig {
            name: "mau".into(),
            path_prefix: "/mau".into(),
            address: upstream.to_string(),
            priority: 0,
        },
    ];
    config
}

/// A running portal.
pub struct Portal {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
}

impl Portal {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for Portal {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_portal(config: PortalConfig) -> Portal {
    start(config, None).await
}

pub async fn start_portal_with_updates(
    config: PortalConfig,
    updates: mpsc::UnboundedReceiver<PortalConfig>,
) -> Portal {
    start(config, Some(updates)).await
}

async fn start(config: PortalConfig, updates: Option<mpsc::UnboundedReceiver<PortalConfig>>) -> Portal {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut server = HttpServer::new(config).unwrap();
    if let Some(updates) = updates {
        server = server.with_config_updates(updates);
    }

    let shutdown = Shutdown::new();
    let handle = shutdown.clone();
    tokio::spawn(async move {
        let _ = server.run(listener, &handle).await;
    });

    Portal { addr, shutdown }
}

/// Client that never follows redirects.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}

#[derive(Serialize)]
struct TestClaims<'a> {
    sub: &'a str,
    role: &'a str,
    exp: u64,
}

/// Session token signed with [`SECRET`], valid for an hour.
pub fn token(sub: &str, role: &str) -> String {
    let exp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() + 3600;
    encode(
        &Header::default(),
        &TestClaims { sub, role, exp },
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn auth_cookie(token: &str) -> String {
    format!("auth={}", token)
}
