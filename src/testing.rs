//! Test doubles shared by the unit tests

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use parking_lot::Mutex;

use crate::load::{HttpTransport, TransportError, TransportRequest};

/// What a [`MockTransport`] does for one try
#[derive(Debug, Clone)]
pub enum MockReply {
    Status(u16),
    Fail(TransportError),
    /// Never answer; the caller's timeout has to fire
    Hang,
    /// Panic inside the transport, taking the calling task down
    Panic,
}

/// A request as seen by the mock
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: http::Method,
    pub user_agent: String,
    pub proxy: Option<String>,
    pub body: Option<bytes::Bytes>,
}

/// Scripted transport with an artificial delay and in-flight tracking
pub struct MockTransport {
    delay: Duration,
    script: Mutex<VecDeque<MockReply>>,
    fallback: MockReply,
    per_proxy: HashMap<String, MockReply>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    seen: Mutex<Vec<SeenRequest>>,
}

impl MockTransport {
    /// Every try gets `reply`
    pub fn always(reply: MockReply) -> Self {
        Self {
            delay: Duration::ZERO,
            script: Mutex::new(VecDeque::new()),
            fallback: reply,
            per_proxy: HashMap::new(),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Tries consume `script` in order, then fall back to `then`
    pub fn scripted(script: Vec<MockReply>, then: MockReply) -> Self {
        let transport = Self::always(then);
        *transport.script.lock() = script.into();
        transport
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Tries through `proxy` get `reply`, regardless of the script
    pub fn with_proxy_reply(mut self, proxy: &str, reply: MockReply) -> Self {
        self.per_proxy.insert(proxy.to_string(), reply);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().clone()
    }

    fn next_reply(&self, proxy: Option<&str>) -> MockReply {
        if let Some(reply) = proxy.and_then(|p| self.per_proxy.get(p)) {
            return reply.clone();
        }
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: TransportRequest<'_>) -> Result<u16, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlight(&self.in_flight);

        let proxy = request.proxy.map(|p| p.address.clone());
        self.seen.lock().push(SeenRequest {
            method: request.method.clone(),
            user_agent: request.user_agent.to_string(),
            proxy: proxy.clone(),
            body: request.body.clone(),
        });

        let reply = self.next_reply(proxy.as_deref());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match reply {
            MockReply::Status(status) => Ok(status),
            MockReply::Fail(err) => Err(err),
            MockReply::Hang => std::future::pending().await,
            MockReply::Panic => panic!("mock transport panicked"),
        }
    }
}

/// Start a local HTTP server for exercising the real transport
///
/// Routes: `/ok` 200, `/missing` 404, `/broken` 500, `/ua` 200 only for the
/// `volley-test` User-Agent, `/submit` 201 only for a `payload` body,
/// `/slow` answers after 5 seconds.
pub async fn spawn_target_server() -> SocketAddr {
    let app = Router::new()
        .route("/ok", get(|| async { "ok" }))
        .route("/ip", get(|| async { "{\"origin\":\"127.0.0.1\"}" }))
        .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
        .route("/broken", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
        .route(
            "/ua",
            get(|headers: HeaderMap| async move {
                match headers.get("user-agent").and_then(|v| v.to_str().ok()) {
                    Some("volley-test") => StatusCode::OK,
                    _ => StatusCode::BAD_REQUEST,
                }
            }),
        )
        .route(
            "/submit",
            post(|body: String| async move {
                if body == "payload" {
                    StatusCode::CREATED
                } else {
                    StatusCode::BAD_REQUEST
                }
            }),
        )
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test server");
    let addr = listener.local_addr().expect("test server address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}
