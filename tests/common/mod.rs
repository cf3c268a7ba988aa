//! Shared utilities for integration testing.

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{HeaderMap, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

use bot_gateway::{Gateway, GatewayConfig, HttpServer, Shutdown};

/// Serve a router on an ephemeral local port.
pub async fn spawn_router(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// What the mock decision service answers, and what it has seen.
pub struct DecisionScript {
    pub status: u16,
    pub headers: Vec<(&'static str, &'static str)>,
    pub body: String,
    pub delay: Duration,
    pub calls: AtomicUsize,
    pub received: Mutex<Vec<(HeaderMap, String)>>,
}

impl DecisionScript {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.push((name, value));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

async fn decide(State(script): State<Arc<DecisionScript>>, request: Request<Body>) -> Response {
    script.calls.fetch_add(1, Ordering::SeqCst);
    let headers = request.headers().clone();
    let body = to_bytes(request.into_body(), 64 * 1024).await.unwrap();
    script
        .received
        .lock()
        .unwrap()
        .push((headers, String::from_utf8_lossy(&body).into_owned()));

    if !script.delay.is_zero() {
        tokio::time::sleep(script.delay).await;
    }

    let mut response = Response::new(Body::from(script.body.clone()));
    *response.status_mut() = StatusCode::from_u16(script.status).unwrap();
    for (name, value) in &script.headers {
        response
            .headers_mut()
            .append(*name, HeaderValue::from_static(*value));
    }
    response
}

/// Start a mock decision service answering on `/validate-request/`.
pub async fn start_decision_service(script: Arc<DecisionScript>) -> SocketAddr {
    spawn_router(
        Router::new()
            .route("/validate-request/", post(decide))
            .with_state(script),
    )
    .await
}

async fn echo(request: Request<Body>) -> impl IntoResponse {
    let relayed = request
        .headers()
        .get("x-relayed")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("none")
        .to_string();
    format!("app {} relayed={}", request.uri(), relayed)
}

/// Start an application echoing the request URI and the `x-relayed` header.
pub async fn start_upstream() -> SocketAddr {
    spawn_router(Router::new().route("/", any(echo)).route("/{*path}", any(echo))).await
}

/// Start a server hosting the challenge page at `/challenge`.
pub async fn start_challenge_page() -> SocketAddr {
    spawn_router(Router::new().route(
        "/challenge",
        get(|| async { ([("content-type", "text/html")], "<h1>challenge</h1>") }),
    ))
    .await
}

/// A running gateway in front of `upstream`, validating against `decision`.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
}

impl TestGateway {
    pub async fn start(decision: SocketAddr, upstream: SocketAddr, timeout_ms: u64) -> Self {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "127.0.0.1:0".into();
        config.upstream.address = upstream.to_string();
        config.validation.endpoint = format!("http://{}/validate-request/", decision);
        config.validation.server_key = "integration-key".into();
        config.validation.timeout_ms = timeout_ms;

        let gateway = Arc::new(Gateway::from_config(config.validation.clone()).unwrap());
        let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let shutdown = Shutdown::new();
        let server = HttpServer::new(config, gateway);
        let server_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            let _ = server.run(listener, server_shutdown).await;
        });

        Self { addr, shutdown }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}
