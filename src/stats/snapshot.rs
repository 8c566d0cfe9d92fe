//! Final statistics of a run

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use crate::models::{ErrorKey, ErrorKind};

/// Nearest-rank percentile over an ascending-sorted sample
///
/// index = floor(count * p / 100), clamped to the last element. Zero for an
/// empty sample.
pub fn nearest_rank(sorted: &[Duration], percentile: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let index = (sorted.len() as f64 * percentile / 100.0).floor() as usize;
    sorted[index.min(sorted.len() - 1)]
}

/// Latency summary over successful attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LatencySummary {
    pub avg: Duration,
    pub min: Duration,
    pub max: Duration,
    pub p50: Duration,
    pub p90: Duration,
    pub p99: Duration,
}

impl LatencySummary {
    /// Summarise latencies given in any order
    pub fn from_latencies(latencies: &[Duration]) -> Self {
        if latencies.is_empty() {
            return Self::default();
        }

        let mut sorted = latencies.to_vec();
        sorted.sort_unstable();

        let total: Duration = sorted.iter().sum();
        Self {
            avg: total / sorted.len() as u32,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            p50: nearest_rank(&sorted, 50.0),
            p90: nearest_rank(&sorted, 90.0),
            p99: nearest_rank(&sorted, 99.0),
        }
    }
}

/// Read-only statistics of a finished run
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    /// Outcomes recorded; equals the configured total attempts
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    /// Transport tries across all attempts, retries included
    pub total_tries: u64,
    /// Wall-clock run duration
    pub duration: Duration,
    /// Status code -> count, ascending by code
    pub status_codes: BTreeMap<u16, u64>,
    pub errors: HashMap<ErrorKey, u64>,
    /// Latencies of successful attempts, in completion order
    pub latencies: Vec<Duration>,
    pub latency: LatencySummary,
}

impl StatsSnapshot {
    /// Attempts per second over the whole run, failures included
    pub fn throughput(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.total as f64 / secs
        } else {
            0.0
        }
    }

    /// Tries beyond the first one of each attempt
    pub fn retries(&self) -> u64 {
        self.total_tries.saturating_sub(self.total)
    }

    /// Errors by descending count, ties broken by key
    pub fn errors_by_frequency(&self) -> Vec<(&ErrorKey, u64)> {
        let mut errors: Vec<_> = self.errors.iter().map(|(k, &v)| (k, v)).collect();
        errors.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        errors
    }

    /// Error counts folded by kind
    pub fn errors_by_kind(&self) -> BTreeMap<ErrorKind, u64> {
        let mut by_kind = BTreeMap::new();
        for (key, count) in &self.errors {
            *by_kind.entry(key.kind).or_insert(0) += count;
        }
        by_kind
    }

    /// Count for the error displayed as `description`
    pub fn error_count(&self, description: &str) -> u64 {
        self.errors
            .iter()
            .filter(|(key, _)| key.description == description)
            .map(|(_, count)| count)
            .sum()
    }
}
