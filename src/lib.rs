//! Volley - HTTP Load Generator
//!
//! A concurrent HTTP load generator written in Rust.
//!
//! ## Features
//!
//! - Fixed-size attempt budget dispatched under a concurrency limit
//! - Retry with exponential backoff for transient transport errors
//! - HTTP, HTTPS, SOCKS5 and SOCKS5h proxy rotation with optional pre-run validation
//! - User-Agent rotation with a seedable RNG
//! - Status-code and error histograms, latency percentiles, throughput
//! - Text report in the log, optional JSON report

pub mod cli;
pub mod config;
pub mod error;
pub mod load;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod proxy;
pub mod report;
pub mod stats;

#[cfg(test)]
mod testing;

pub use cli::Cli;
pub use config::{RawConfig, RunConfig};
pub use error::{Result, VolleyError};
pub use orchestrator::{Orchestrator, RunReport, RunState};
