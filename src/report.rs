//! Run report rendering
//!
//! The human-readable report goes through `tracing`, so it lands on the
//! console and in the log file. A machine-readable JSON copy can be written
//! next to it.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use crate::error::Result;
use crate::models::ErrorKind;
use crate::orchestrator::RunReport;
use crate::stats::StatsSnapshot;

/// Render the report as lines, without trailing newlines
pub fn render(snapshot: &StatsSnapshot) -> Vec<String> {
    let mut lines = vec![
        "--- Stress Test Report ---".to_string(),
        format!("Total time: {:.2} seconds", snapshot.duration.as_secs_f64()),
        format!("Total requests: {}", snapshot.total),
        format!("Successful requests: {}", snapshot.successful),
        format!("Failed requests: {}", snapshot.failed),
        format!("Requests per second: {:.2}", snapshot.throughput()),
    ];

    if snapshot.retries() > 0 {
        lines.push(format!(
            "Transport tries: {} ({} retries)",
            snapshot.total_tries,
            snapshot.retries()
        ));
    }

    if !snapshot.latencies.is_empty() {
        let l = &snapshot.latency;
        lines.push(format!(
            "Latency (s): Avg={:.4}, Min={:.4}, Max={:.4}",
            secs(l.avg),
            secs(l.min),
            secs(l.max)
        ));
        lines.push(format!(
            "Latency Percentiles (s): P50={:.4}, P90={:.4}, P99={:.4}",
            secs(l.p50),
            secs(l.p90),
            secs(l.p99)
        ));
    }

    lines.push("Status Codes:".to_string());
    for (code, count) in &snapshot.status_codes {
        lines.push(format!("  {}: {}", code, count));
    }

    if !snapshot.errors.is_empty() {
        lines.push("Errors:".to_string());
        for (key, count) in snapshot.errors_by_frequency() {
            lines.push(format!("  {}: {}", key, count));
        }
    }

    lines
}

/// Write the report to the log
pub fn log_report(snapshot: &StatsSnapshot) {
    for line in render(snapshot) {
        info!("{}", line);
    }
}

fn secs(d: Duration) -> f64 {
    d.as_secs_f64()
}

/// JSON form of a finished run
#[derive(Debug, Serialize)]
pub struct JsonReport {
    pub url: String,
    pub method: &'static str,
    pub concurrency: usize,
    pub total_attempts: u64,
    pub proxies_used: usize,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub total_tries: u64,
    pub requests_per_second: f64,
    pub latency: JsonLatency,
    pub status_codes: BTreeMap<u16, u64>,
    pub errors_by_kind: BTreeMap<ErrorKind, u64>,
    pub errors: Vec<JsonError>,
}

/// Latency figures in seconds
#[derive(Debug, Serialize)]
pub struct JsonLatency {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
}

#[derive(Debug, Serialize)]
pub struct JsonError {
    pub kind: ErrorKind,
    pub description: String,
    pub count: u64,
}

impl JsonReport {
    pub fn from_run(run: &RunReport) -> Self {
        let snapshot = &run.snapshot;
        let l = &snapshot.latency;

        Self {
            url: run.config.url.to_string(),
            method: run.config.method.as_str(),
            concurrency: run.config.concurrency,
            total_attempts: run.config.total_attempts,
            proxies_used: run.proxies_used,
            started_at: run.started_at,
            duration_secs: secs(snapshot.duration),
            total: snapshot.total,
            successful: snapshot.successful,
            failed: snapshot.failed,
            total_tries: snapshot.total_tries,
            requests_per_second: snapshot.throughput(),
            latency: JsonLatency {
                avg: secs(l.avg),
                min: secs(l.min),
                max: secs(l.max),
                p50: secs(l.p50),
                p90: secs(l.p90),
                p99: secs(l.p99),
            },
            status_codes: snapshot.status_codes.clone(),
            errors_by_kind: snapshot.errors_by_kind(),
            errors: snapshot
                .errors_by_frequency()
                .into_iter()
                .map(|(key, count)| JsonError {
                    kind: key.kind,
                    description: key.description.clone(),
                    count,
                })
                .collect(),
        }
    }
}

/// Write the JSON report to `path`, replacing any existing file
#[instrument(skip(run))]
pub fn write_json(path: &Path, run: &RunReport) -> Result<()> {
    let report = JsonReport::from_run(run);
    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(path, json)?;
    info!("JSON report written to {}", path.display());
    Ok(())
}
