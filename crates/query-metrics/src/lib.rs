//! Query performance metrics
//!
//! [`MetricsRecorder`] keeps a bounded log of per-query executions (oldest
//! dropped first) and folds a trailing time window of it into a
//! [`PerformanceReport`]: volume, mean latency, cache hit rate, the slowest
//! queries and the most frequent ones.

pub mod config;
pub mod recorder;
pub mod report;

pub use config::MetricsConfig;
pub use recorder::{MetricsRecorder, QueryMetric};
pub use report::{PerformanceReport, TopQuery};
