//! Run statistics aggregation
//!
//! A single task owns all counters. Dispatcher tasks hand their records over
//! a channel, so an update is applied all at once and in arrival order. Taking
//! the final snapshot consumes the aggregator, which means no snapshot can be
//! observed while recorders are still active.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::error::{Result, VolleyError};
use crate::models::{AttemptOutcome, AttemptRecord, ErrorKey};

use super::snapshot::{LatencySummary, StatsSnapshot};

/// Counters owned by the aggregator task
#[derive(Debug, Default)]
pub struct StatsCollector {
    status_codes: BTreeMap<u16, u64>,
    errors: HashMap<ErrorKey, u64>,
    latencies: Vec<Duration>,
    total_tries: u64,
    recorded: u64,
}

impl StatsCollector {
    /// Apply one attempt record
    pub fn apply(&mut self, record: AttemptRecord) {
        self.recorded += 1;
        self.total_tries += u64::from(record.tries);

        match record.outcome {
            AttemptOutcome::Success { status, latency } => {
                *self.status_codes.entry(status).or_insert(0) += 1;
                self.latencies.push(latency);
            }
            outcome @ AttemptOutcome::Failure { .. } => {
                if let Some(key) = outcome.error_key() {
                    *self.errors.entry(key).or_insert(0) += 1;
                }
            }
        }
    }

    pub fn recorded(&self) -> u64 {
        self.recorded
    }

    /// Freeze the counters into a snapshot
    pub fn into_snapshot(self, duration: Duration) -> StatsSnapshot {
        let successful: u64 = self.status_codes.values().sum();
        let failed: u64 = self.errors.values().sum();
        let latency = LatencySummary::from_latencies(&self.latencies);

        StatsSnapshot {
            total: self.recorded,
            successful,
            failed,
            total_tries: self.total_tries,
            duration,
            status_codes: self.status_codes,
            errors: self.errors,
            latencies: self.latencies,
            latency,
        }
    }
}

/// Handle used by dispatcher tasks to report outcomes
#[derive(Debug, Clone)]
pub struct StatsRecorder {
    tx: mpsc::Sender<AttemptRecord>,
}

impl StatsRecorder {
    /// Hand a record to the aggregator, waiting if its queue is full
    pub async fn record(&self, record: AttemptRecord) -> Result<()> {
        self.tx
            .send(record)
            .await
            .map_err(|_| VolleyError::Internal("stats aggregator is closed".into()))
    }
}

/// Owner of the aggregation task
pub struct StatsAggregator {
    tx: mpsc::Sender<AttemptRecord>,
    task: JoinHandle<StatsCollector>,
}

impl StatsAggregator {
    /// Spawn the aggregation task with a queue of `buffer` records
    pub fn spawn(buffer: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<AttemptRecord>(buffer.max(1));

        let task = tokio::spawn(async move {
            let mut collector = StatsCollector::default();
            while let Some(record) = rx.recv().await {
                collector.apply(record);
            }
            debug!("Stats aggregator drained {} records", collector.recorded());
            collector
        });

        Self { tx, task }
    }

    pub fn recorder(&self) -> StatsRecorder {
        StatsRecorder {
            tx: self.tx.clone(),
        }
    }

    /// Wait for every recorder to be dropped, then produce the snapshot
    pub async fn finish(self, duration: Duration) -> Result<StatsSnapshot> {
        let StatsAggregator { tx, task } = self;
        drop(tx);

        let collector = task.await.map_err(|e| {
            error!("Stats aggregator task failed: {}", e);
            VolleyError::Internal(format!("stats aggregator task failed: {}", e))
        })?;

        Ok(collector.into_snapshot(duration))
    }
}
