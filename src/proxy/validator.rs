//! Pre-run validation of candidate proxies
//!
//! Every candidate gets exactly one probe request. Probes run concurrently
//! and a proxy is kept only if its probe answers HTTP 200.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use http::Method;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::RunConfig;
use crate::load::user_agent::PROBE_USER_AGENT;
use crate::load::{HttpTransport, TransportRequest};
use crate::models::{Proxy, ProxyValidity};

/// Proxy validator
pub struct ProxyValidator {
    transport: Arc<dyn HttpTransport>,
    probe_url: Url,
    probe_timeout: Duration,
    method: Method,
}

impl ProxyValidator {
    pub fn new(transport: Arc<dyn HttpTransport>, probe_url: Url, probe_timeout: Duration) -> Self {
        Self {
            transport,
            probe_url,
            probe_timeout,
            method: Method::GET,
        }
    }

    pub fn from_config(config: &RunConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self::new(transport, config.probe_url.clone(), config.probe_timeout)
    }

    /// Probe all candidates and return the valid ones, in input order
    ///
    /// An empty result is not an error: the run then goes out without proxies.
    #[instrument(skip(self, candidates), fields(candidates = candidates.len()))]
    pub async fn validate(&self, candidates: Vec<Proxy>) -> Vec<Proxy> {
        info!(
            "Validating {} proxies against {}",
            candidates.len(),
            self.probe_url
        );

        // Every probe runs at once; `buffered` keeps the input order.
        let width = candidates.len().max(1);
        let checked: Vec<Proxy> = futures::stream::iter(candidates)
            .map(|proxy| async move {
                let validity = self.probe(&proxy).await;
                proxy.with_validity(validity)
            })
            .buffered(width)
            .collect()
            .await;

        let total = checked.len();
        let valid: Vec<Proxy> = checked.into_iter().filter(Proxy::is_valid).collect();

        info!(
            "Proxy validation complete: {} valid, {} invalid",
            valid.len(),
            total - valid.len()
        );

        if valid.is_empty() {
            warn!("No valid proxies available after validation.");
        }

        valid
    }

    /// Probe a single proxy
    async fn probe(&self, proxy: &Proxy) -> ProxyValidity {
        debug!("Probing {} proxy {}", proxy.protocol, proxy.address);

        let request = TransportRequest {
            method: &self.method,
            url: &self.probe_url,
            body: None,
            user_agent: PROBE_USER_AGENT,
            proxy: Some(proxy),
        };

        match timeout(self.probe_timeout, self.transport.send(request)).await {
            Ok(Ok(200)) => {
                info!("Proxy {} is valid.", proxy.address);
                ProxyValidity::Valid
            }
            Ok(Ok(status)) => {
                warn!("Proxy {} returned status {}.", proxy.address, status);
                ProxyValidity::Invalid
            }
            Ok(Err(e)) => {
                warn!("Proxy {} failed validation: {}", proxy.address, e);
                ProxyValidity::Invalid
            }
            Err(_) => {
                warn!(
                    "Proxy {} failed validation: probe timed out after {}s",
                    proxy.address,
                    self.probe_timeout.as_secs()
                );
                ProxyValidity::Invalid
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::{ReqwestTransport, TransportError};
    use crate::testing::{spawn_target_server, MockReply, MockTransport};

    const P_OK: &str = "http://10.0.0.1:3128";
    const P_BAD: &str = "http://10.0.0.2:3128";

    fn probe_url() -> Url {
        Url::parse("http://httpbin.org/ip").unwrap()
    }

    fn proxies(addresses: &[&str]) -> Vec<Proxy> {
        addresses.iter().map(|a| Proxy::parse(a).unwrap()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_validate_keeps_only_proxies_answering_200() {
        let transport = Arc::new(
            MockTransport::always(MockReply::Status(200)).with_proxy_reply(P_BAD, MockReply::Hang),
        );
        let validator = ProxyValidator::new(transport.clone(), probe_url(), Duration::from_secs(10));

        let valid = validator.validate(proxies(&[P_OK, P_BAD])).await;

        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].address, P_OK);
        assert_eq!(valid[0].validity, ProxyValidity::Valid);
        // One probe per candidate, no retries
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probes_run_concurrently() {
        let transport = Arc::new(
            MockTransport::always(MockReply::Status(200)).with_delay(Duration::from_secs(1)),
        );
        let validator = ProxyValidator::new(transport.clone(), probe_url(), Duration::from_secs(10));

        let start = tokio::time::Instant::now();
        let valid = validator
            .validate(proxies(&[P_OK, P_BAD, "http://10.0.0.3:3128"]))
            .await;

        assert_eq!(valid.len(), 3);
        assert_eq!(transport.max_in_flight(), 3);
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_non_200_and_errors_are_invalid() {
        let transport = Arc::new(
            MockTransport::always(MockReply::Status(200))
                .with_proxy_reply(P_OK, MockReply::Status(407))
                .with_proxy_reply(
                    P_BAD,
                    MockReply::Fail(TransportError::Connect("connection refused".into())),
                ),
        );
        let validator = ProxyValidator::new(transport, probe_url(), Duration::from_secs(10));

        let valid = validator.validate(proxies(&[P_OK, P_BAD])).await;
        assert!(valid.is_empty());
    }

    #[tokio::test]
    async fn test_validate_empty_candidate_list() {
        let transport = Arc::new(MockTransport::always(MockReply::Status(200)));
        let validator = ProxyValidator::new(transport.clone(), probe_url(), Duration::from_secs(10));

        assert!(validator.validate(Vec::new()).await.is_empty());
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_probe_uses_get_and_probe_user_agent() {
        let transport = Arc::new(MockTransport::always(MockReply::Status(200)));
        let validator = ProxyValidator::new(transport.clone(), probe_url(), Duration::from_secs(10));

        validator.validate(proxies(&[P_OK])).await;

        let seen = transport.seen();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].method, Method::GET);
        assert_eq!(seen[0].user_agent, PROBE_USER_AGENT);
        assert_eq!(seen[0].proxy.as_deref(), Some(P_OK));
        assert!(seen[0].body.is_none());
    }

    #[tokio::test]
    async fn test_validate_with_real_transport() {
        let proxy_addr = spawn_target_server().await;
        let dead = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let dead_addr = dead.local_addr().unwrap();
        drop(dead);

        let good = format!("http://{}", proxy_addr);
        let bad = format!("http://{}", dead_addr);

        let transport = Arc::new(ReqwestTransport::new().unwrap());
        let validator = ProxyValidator::new(
            transport,
            Url::parse("http://probe.invalid/ip").unwrap(),
            Duration::from_secs(10),
        );

        let valid = validator
            .validate(proxies(&[good.as_str(), bad.as_str()]))
            .await;
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].address, good);
    }
}
