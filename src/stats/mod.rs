//! Run statistics

pub mod aggregator;
pub mod snapshot;

pub use aggregator::{StatsAggregator, StatsCollector, StatsRecorder};
pub use snapshot::{nearest_rank, LatencySummary, StatsSnapshot};
