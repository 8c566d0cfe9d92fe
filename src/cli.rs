use std::path::PathBuf;

use clap::Parser;

use crate::config::{LogFormat, RawConfig, RequestMethod};
use crate::error::Result;

/// Volley HTTP load generator
///
/// Flags given on the command line override values from the config file.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "volley")]
#[command(about = "Concurrent HTTP load generator with proxy rotation")]
#[command(version)]
pub struct Cli {
    /// Target URL
    pub url: Option<String>,

    /// Concurrent requests in flight [default: 100]
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Requests per thread [default: 1000]
    #[arg(short, long)]
    pub requests: Option<u64>,

    /// Per-request timeout in seconds [default: 5]
    #[arg(long)]
    pub timeout: Option<u64>,

    /// HTTP method [default: GET]
    #[arg(long, value_enum, ignore_case = true)]
    pub method: Option<RequestMethod>,

    /// Request body for POST
    #[arg(long)]
    pub data: Option<String>,

    /// Proxies to rotate through (http, https, socks5, socks5h)
    #[arg(long, num_args = 1..)]
    pub proxies: Option<Vec<String>>,

    /// Log file, truncated at start [default: stress_test.log]
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// JSON config file
    #[arg(long, env = "VOLLEY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Probe proxies before the run and drop the ones that fail
    #[arg(long)]
    pub validate_proxies: bool,

    /// URL used to probe proxies [default: http://httpbin.org/ip]
    #[arg(long)]
    pub probe_url: Option<String>,

    /// Seed for User-Agent and proxy selection
    #[arg(long)]
    pub seed: Option<u64>,

    /// Log file format [default: text]
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Also write the report as JSON to this path
    #[arg(long)]
    pub report_json: Option<PathBuf>,
}

impl Cli {
    /// Values given on the command line; everything else stays unset
    pub fn overrides(&self) -> RawConfig {
        RawConfig {
            url: self.url.clone(),
            threads: self.threads,
            requests: self.requests,
            timeout: self.timeout,
            method: self.method,
            data: self.data.clone(),
            proxies: self.proxies.clone(),
            log_file: self.log_file.clone(),
            validate_proxies: self.validate_proxies.then_some(true),
            probe_url: self.probe_url.clone(),
            seed: self.seed,
            log_format: self.log_format,
            report_json: self.report_json.clone(),
            retry: None,
        }
    }

    /// Command line layered over the config file, if one was given
    pub fn load(&self) -> Result<RawConfig> {
        let file = match &self.config {
            Some(path) => RawConfig::from_file(path)?,
            None => RawConfig::default(),
        };
        Ok(self.overrides().merge(file))
    }
}
