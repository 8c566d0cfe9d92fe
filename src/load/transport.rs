//! HTTP transport layer
//!
//! Performs a single network try. Dispatcher and proxy validator both go
//! through [`HttpTransport`], so tests can swap the network for a scripted
//! transport.

use std::collections::HashMap;
use std::error::Error as _;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::USER_AGENT;
use http::Method;
use parking_lot::Mutex;
use reqwest::Client;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::error::Result;
use crate::models::Proxy;

/// One transport try
#[derive(Debug, Clone)]
pub struct TransportRequest<'a> {
    pub method: &'a Method,
    pub url: &'a Url,
    pub body: Option<Bytes>,
    pub user_agent: &'a str,
    pub proxy: Option<&'a Proxy>,
}

/// Failure of a single transport try
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Timeout")]
    Timeout,

    /// The connection could not be established
    #[error("{0}")]
    Connect(String),

    /// Anything else that went wrong on the wire
    #[error("{0}")]
    Transport(String),
}

impl TransportError {
    /// Only generic transport errors are worth another try
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Transport(_))
    }

    /// Classify a [`reqwest::Error`]
    pub fn classify_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(describe(err))
        } else {
            TransportError::Transport(describe(err))
        }
    }
}

/// Render an error together with its source chain
fn describe(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

/// Trait for performing HTTP tries
///
/// Returns the status code of any received response. Timeouts are enforced
/// by the caller.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: TransportRequest<'_>) -> std::result::Result<u16, TransportError>;
}

/// Production transport backed by `reqwest`
///
/// reqwest binds proxies to a client, so one client is kept per proxy address
/// and built the first time that proxy is used.
pub struct ReqwestTransport {
    direct: Client,
    proxied: Mutex<HashMap<String, Client>>,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        // Ignore HTTP_PROXY & co: proxy use is decided by the run configuration.
        let direct = Client::builder().no_proxy().build()?;
        Ok(Self {
            direct,
            proxied: Mutex::new(HashMap::new()),
        })
    }

    fn client_for(&self, proxy: Option<&Proxy>) -> std::result::Result<Client, TransportError> {
        let Some(proxy) = proxy else {
            return Ok(self.direct.clone());
        };

        let mut clients = self.proxied.lock();
        if let Some(client) = clients.get(&proxy.address) {
            return Ok(client.clone());
        }

        debug!("Building client for proxy {}", proxy.address);
        let client = reqwest::Proxy::all(proxy.address.as_str())
            .and_then(|p| Client::builder().proxy(p).build())
            .map_err(|e| {
                TransportError::Connect(format!("invalid proxy {}: {}", proxy.address, e))
            })?;
        clients.insert(proxy.address.clone(), client.clone());
        Ok(client)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: TransportRequest<'_>) -> std::result::Result<u16, TransportError> {
        let client = self.client_for(request.proxy)?;

        let mut builder = client
            .request(request.method.clone(), request.url.clone())
            .header(USER_AGENT, request.user_agent);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::classify_reqwest(&e))?;

        Ok(response.status().as_u16())
    }
}
