use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use serde::Deserialize;
use url::Url;

use crate::error::{Result, VolleyError};
use crate::load::RetryPolicy;
use crate::models::Proxy;

pub const DEFAULT_THREADS: usize = 100;
pub const DEFAULT_REQUESTS_PER_THREAD: u64 = 1000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_LOG_FILE: &str = "stress_test.log";
pub const DEFAULT_PROBE_URL: &str = "http://httpbin.org/ip";

/// Probe timeout for proxy validation, independent of the request timeout
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP method used for load requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
#[value(rename_all = "UPPERCASE")]
pub enum RequestMethod {
    #[default]
    #[serde(alias = "get")]
    Get,
    #[serde(alias = "post")]
    Post,
}

impl RequestMethod {
    pub fn as_http(&self) -> http::Method {
        match self {
            RequestMethod::Get => http::Method::GET,
            RequestMethod::Post => http::Method::POST,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMethod::Get => "GET",
            RequestMethod::Post => "POST",
        }
    }
}

/// Output format of the log file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Retry section of the config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RetryFileConfig {
    pub max_attempts: Option<u32>,
    pub initial_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
}

/// Unresolved configuration, as read from the command line or a JSON file
///
/// Every field is optional so two sources can be layered with [`RawConfig::merge`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawConfig {
    pub url: Option<String>,
    pub threads: Option<usize>,
    pub requests: Option<u64>,
    pub timeout: Option<u64>,
    pub method: Option<RequestMethod>,
    pub data: Option<String>,
    pub proxies: Option<Vec<String>>,
    pub log_file: Option<PathBuf>,
    pub validate_proxies: Option<bool>,
    pub probe_url: Option<String>,
    pub seed: Option<u64>,
    pub log_format: Option<LogFormat>,
    pub report_json: Option<PathBuf>,
    pub retry: Option<RetryFileConfig>,
}

/// Fully resolved, immutable run configuration
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub url: Url,
    pub method: RequestMethod,
    /// Request body, sent only with POST
    pub body: Bytes,
    /// Per-request timeout
    pub timeout: Duration,
    /// Maximum simultaneous in-flight attempts (`threads`)
    pub concurrency: usize,
    pub requests_per_thread: u64,
    /// `threads * requests`
    pub total_attempts: u64,
    /// Candidate proxies, validity still unknown
    pub proxies: Vec<Proxy>,
    pub validate_proxies: bool,
    pub probe_url: Url,
    pub probe_timeout: Duration,
    pub retry: RetryPolicy,
    pub seed: Option<u64>,
    pub log_file: PathBuf,
    pub log_format: LogFormat,
    pub report_json: Option<PathBuf>,
}

impl RawConfig {
    /// Load a JSON config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| VolleyError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Layer `self` over `fallback`: values present in `self` win.
    pub fn merge(self, fallback: RawConfig) -> RawConfig {
        RawConfig {
            url: self.url.or(fallback.url),
            threads: self.threads.or(fallback.threads),
            requests: self.requests.or(fallback.requests),
            timeout: self.timeout.or(fallback.timeout),
            method: self.method.or(fallback.method),
            data: self.data.or(fallback.data),
            proxies: self.proxies.or(fallback.proxies),
            log_file: self.log_file.or(fallback.log_file),
            validate_proxies: self.validate_proxies.or(fallback.validate_proxies),
            probe_url: self.probe_url.or(fallback.probe_url),
            seed: self.seed.or(fallback.seed),
            log_format: self.log_format.or(fallback.log_format),
            report_json: self.report_json.or(fallback.report_json),
            retry: match (self.retry, fallback.retry) {
                (Some(primary), Some(secondary)) => Some(RetryFileConfig {
                    max_attempts: primary.max_attempts.or(secondary.max_attempts),
                    initial_backoff_ms: primary
                        .initial_backoff_ms
                        .or(secondary.initial_backoff_ms),
                    max_backoff_ms: primary.max_backoff_ms.or(secondary.max_backoff_ms),
                }),
                (primary, secondary) => primary.or(secondary),
            },
        }
    }

    /// Log file path this configuration will use once resolved
    pub fn log_file(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE))
    }

    pub fn log_format(&self) -> LogFormat {
        self.log_format.unwrap_or_default()
    }

    /// Validate and resolve into a [`RunConfig`]
    pub fn resolve(self) -> Result<RunConfig> {
        let raw_url = self
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(VolleyError::MissingUrl)?;
        let url = parse_http_url("url", raw_url)?;

        let threads = self.threads.unwrap_or(DEFAULT_THREADS);
        if threads == 0 {
            return Err(VolleyError::InvalidConfig(
                "threads must be at least 1".into(),
            ));
        }
        if threads > tokio::sync::Semaphore::MAX_PERMITS {
            return Err(VolleyError::InvalidConfig(format!(
                "threads must not exceed {}",
                tokio::sync::Semaphore::MAX_PERMITS
            )));
        }

        let requests_per_thread = self.requests.unwrap_or(DEFAULT_REQUESTS_PER_THREAD);
        if requests_per_thread == 0 {
            return Err(VolleyError::InvalidConfig(
                "requests must be at least 1".into(),
            ));
        }

        let total_attempts = (threads as u64)
            .checked_mul(requests_per_thread)
            .ok_or_else(|| {
                VolleyError::InvalidConfig("threads * requests overflows".into())
            })?;

        let timeout_secs = self.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(VolleyError::InvalidConfig(
                "timeout must be at least 1 second".into(),
            ));
        }

        let proxies = self
            .proxies
            .unwrap_or_default()
            .iter()
            .map(|raw| Proxy::parse(raw))
            .collect::<Result<Vec<_>>>()?;

        let probe_url = parse_http_url(
            "probe_url",
            self.probe_url.as_deref().unwrap_or(DEFAULT_PROBE_URL),
        )?;

        let retry = resolve_retry(self.retry.unwrap_or_default())?;

        Ok(RunConfig {
            url,
            method: self.method.unwrap_or_default(),
            body: Bytes::from(self.data.unwrap_or_default()),
            timeout: Duration::from_secs(timeout_secs),
            concurrency: threads,
            requests_per_thread,
            total_attempts,
            proxies,
            validate_proxies: self.validate_proxies.unwrap_or(false),
            probe_url,
            probe_timeout: PROBE_TIMEOUT,
            retry,
            seed: self.seed,
            log_file: self
                .log_file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
            log_format: self.log_format.unwrap_or_default(),
            report_json: self.report_json,
        })
    }
}

fn parse_http_url(field: &str, raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| {
        VolleyError::InvalidConfig(format!("{} must be a valid URL: {}", field, e))
    })?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(VolleyError::InvalidConfig(format!(
                "{} has unsupported scheme: {}",
                field, other
            )))
        }
    }

    if url.host_str().is_none() {
        return Err(VolleyError::InvalidConfig(format!(
            "{} must include a host",
            field
        )));
    }

    Ok(url)
}

fn resolve_retry(file: RetryFileConfig) -> Result<RetryPolicy> {
    let defaults = RetryPolicy::default();

    let max_attempts = file.max_attempts.unwrap_or(defaults.max_attempts);
    if max_attempts == 0 {
        return Err(VolleyError::InvalidConfig(
            "retry.max_attempts must be at least 1".into(),
        ));
    }

    let initial_backoff = file
        .initial_backoff_ms
        .map(Duration::from_millis)
        .unwrap_or(defaults.initial_backoff);
    let max_backoff = file
        .max_backoff_ms
        .map(Duration::from_millis)
        .unwrap_or(defaults.max_backoff);
    if max_backoff < initial_backoff {
        return Err(VolleyError::InvalidConfig(
            "retry.max_backoff_ms must not be below retry.initial_backoff_ms".into(),
        ));
    }

    Ok(RetryPolicy {
        max_attempts,
        initial_backoff,
        max_backoff,
    })
}
