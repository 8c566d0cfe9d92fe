//! Request dispatcher with retry logic
//!
//! Turns one attempt into exactly one [`AttemptRecord`], however many
//! transport tries it takes.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::Method;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, instrument, warn};
use url::Url;

use super::retry::RetryPolicy;
use super::transport::{HttpTransport, TransportError, TransportRequest};
use super::user_agent::choose_user_agent;
use crate::config::{RequestMethod, RunConfig};
use crate::models::{AttemptOutcome, AttemptRecord, ErrorKind, Proxy};
use crate::proxy::ProxyPool;

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub url: Url,
    pub method: RequestMethod,
    pub body: Bytes,
    /// Timeout applied to every transport try
    pub timeout: Duration,
    pub retry: RetryPolicy,
    /// Seed for User-Agent and proxy selection; `None` seeds from entropy
    pub seed: Option<u64>,
}

impl DispatcherConfig {
    pub fn from_run_config(config: &RunConfig) -> Self {
        Self {
            url: config.url.clone(),
            method: config.method,
            body: config.body.clone(),
            timeout: config.timeout,
            retry: config.retry,
            seed: config.seed,
        }
    }
}

/// Executes attempts against the target
pub struct Dispatcher {
    transport: Arc<dyn HttpTransport>,
    config: DispatcherConfig,
    method: Method,
    proxies: ProxyPool,
    rng: Mutex<StdRng>,
}

impl Dispatcher {
    pub fn new(
        config: DispatcherConfig,
        proxies: ProxyPool,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            transport,
            method: config.method.as_http(),
            config,
            proxies,
            rng: Mutex::new(rng),
        }
    }

    pub fn proxies(&self) -> &ProxyPool {
        &self.proxies
    }

    /// Run one attempt to its terminal outcome
    ///
    /// Timeouts and connect errors end the attempt immediately. Other transport
    /// errors are retried with backoff until the retry policy is exhausted.
    #[instrument(level = "debug", skip(self))]
    pub async fn dispatch(&self, attempt_id: u64) -> AttemptRecord {
        let mut tries = 0u32;

        let outcome = loop {
            tries += 1;

            let (user_agent, proxy) = self.pick();
            let request = TransportRequest {
                method: &self.method,
                url: &self.config.url,
                body: self.body(),
                user_agent,
                proxy: proxy.as_deref(),
            };

            let started = Instant::now();
            let error = match timeout(self.config.timeout, self.transport.send(request)).await {
                Ok(Ok(status)) => break AttemptOutcome::success(status, started.elapsed()),
                Ok(Err(e)) => e,
                Err(_) => TransportError::Timeout,
            };

            match error {
                TransportError::Timeout => break AttemptOutcome::timeout(),
                TransportError::Connect(description) => {
                    debug!("Attempt {} could not connect: {}", attempt_id, description);
                    break AttemptOutcome::failure(ErrorKind::Connect, description);
                }
                TransportError::Transport(description) => {
                    match self.config.retry.backoff_after(tries) {
                        Some(delay) => {
                            debug!(
                                "Attempt {} failed: {} (try {}/{}), retrying in {:?}",
                                attempt_id, description, tries, self.config.retry.max_attempts, delay
                            );
                            sleep(delay).await;
                        }
                        None => {
                            warn!(
                                "Attempt {} failed after {} tries: {}",
                                attempt_id, tries, description
                            );
                            break AttemptOutcome::failure(ErrorKind::Transport, description);
                        }
                    }
                }
            }
        };

        AttemptRecord {
            attempt_id,
            tries,
            outcome,
        }
    }

    /// Pick a User-Agent and, if the pool is non-empty, a proxy
    fn pick(&self) -> (&'static str, Option<Arc<Proxy>>) {
        let mut rng = self.rng.lock();
        let user_agent = choose_user_agent(&mut *rng);
        let proxy = self.proxies.choose(&mut *rng);
        (user_agent, proxy)
    }

    fn body(&self) -> Option<Bytes> {
        match self.config.method {
            RequestMethod::Post => Some(self.config.body.clone()),
            RequestMethod::Get => None,
        }
    }
}
