//! Run orchestration
//!
//! Drives one run through its states:
//!
//! ```text
//! Idle -> Validating (optional) -> Dispatching -> Reporting -> Done
//! Idle -> Aborted                  (configuration could not be resolved)
//! ```
//!
//! Every attempt gets its own task up front; a semaphore sized to the
//! configured concurrency gates how many of them are on the network at once.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Semaphore};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{RawConfig, RunConfig};
use crate::error::{Result, VolleyError};
use crate::load::{Dispatcher, DispatcherConfig, HttpTransport};
use crate::models::{AttemptOutcome, AttemptRecord, ErrorKind, Proxy};
use crate::proxy::{ProxyPool, ProxyValidator};
use crate::report;
use crate::stats::{StatsAggregator, StatsSnapshot};

/// Lifecycle state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Validating,
    Dispatching,
    Reporting,
    Done,
    Aborted,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Aborted)
    }
}

/// Everything known about a finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub config: RunConfig,
    pub snapshot: StatsSnapshot,
    /// Proxies the dispatcher drew from after validation
    pub proxies_used: usize,
    pub started_at: DateTime<Utc>,
}

/// Runs a load test end to end
pub struct Orchestrator {
    transport: Arc<dyn HttpTransport>,
    state: watch::Sender<RunState>,
}

impl Orchestrator {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        let (state, _) = watch::channel(RunState::Idle);
        Self { transport, state }
    }

    /// Watch state changes
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    fn transition(&self, next: RunState) {
        let previous = self.state.send_replace(next);
        debug!("Run state {:?} -> {:?}", previous, next);
    }

    /// Resolve the configuration and execute the run
    ///
    /// Configuration errors abort the run before any request is sent.
    pub async fn run(&self, raw: RawConfig) -> Result<RunReport> {
        let config = match raw.resolve() {
            Ok(config) => config,
            Err(e) => {
                error!("{}", e);
                self.transition(RunState::Aborted);
                return Err(e);
            }
        };

        self.execute(config).await
    }

    /// Execute a run from an already resolved configuration
    #[instrument(skip(self, config), fields(url = %config.url, total = config.total_attempts))]
    pub async fn execute(&self, config: RunConfig) -> Result<RunReport> {
        let started_at = Utc::now();

        let proxies = self.select_proxies(&config).await;
        let dispatcher = Arc::new(Dispatcher::new(
            DispatcherConfig::from_run_config(&config),
            ProxyPool::new(proxies),
            self.transport.clone(),
        ));
        let proxies_used = dispatcher.proxies().len();

        self.transition(RunState::Dispatching);
        info!("Starting stress test...");
        info!(
            "Target: {} {} | concurrency: {} | attempts: {} | proxies: {}",
            config.method.as_str(),
            config.url,
            config.concurrency,
            config.total_attempts,
            proxies_used
        );

        let aggregator = StatsAggregator::spawn(channel_buffer(config.concurrency));
        let semaphore = Arc::new(Semaphore::new(config.concurrency));

        let start = Instant::now();
        let mut handles = Vec::new();
        for attempt_id in 0..config.total_attempts {
            let dispatcher = dispatcher.clone();
            let semaphore = semaphore.clone();
            let recorder = aggregator.recorder();

            let handle = tokio::spawn(async move {
                let permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| VolleyError::Internal("concurrency limiter closed".into()))?;
                let record = dispatcher.dispatch(attempt_id).await;
                drop(permit);
                recorder.record(record).await
            });
            handles.push((attempt_id, handle));
        }

        // Records for tasks that died before reporting their own outcome
        let recorder = aggregator.recorder();
        for (attempt_id, handle) in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(e),
                Err(e) => {
                    warn!("Attempt {} task failed: {}", attempt_id, e);
                    recorder
                        .record(AttemptRecord {
                            attempt_id,
                            tries: 1,
                            outcome: AttemptOutcome::failure(ErrorKind::Internal, e.to_string()),
                        })
                        .await?;
                }
            }
        }
        drop(recorder);
        let duration = start.elapsed();

        self.transition(RunState::Reporting);
        let snapshot = aggregator.finish(duration).await?;

        if snapshot.total != config.total_attempts {
            error!(
                "Recorded {} outcomes for {} attempts",
                snapshot.total, config.total_attempts
            );
        }
        report::log_report(&snapshot);

        let run = RunReport {
            config,
            snapshot,
            proxies_used,
            started_at,
        };

        if let Some(path) = &run.config.report_json {
            report::write_json(path, &run)?;
        }

        self.transition(RunState::Done);
        Ok(run)
    }

    /// Validate candidates when asked to, otherwise use them as given
    async fn select_proxies(&self, config: &RunConfig) -> Vec<Proxy> {
        if !config.validate_proxies || config.proxies.is_empty() {
            return config.proxies.clone();
        }

        self.transition(RunState::Validating);
        ProxyValidator::from_config(config, self.transport.clone())
            .validate(config.proxies.clone())
            .await
    }
}

/// Outcome queue size: a few records per concurrent slot
fn channel_buffer(concurrency: usize) -> usize {
    concurrency.saturating_mul(4).clamp(16, 65_536)
}
