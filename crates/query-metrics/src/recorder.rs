//! Bounded log of query executions

use crate::config::MetricsConfig;
use crate::report::{PerformanceReport, TopQuery};
use parking_lot::Mutex;
use query_core::time::{as_millis_f64, duration_ms_f64};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

/// Statistics for one query execution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryMetric {
    pub query_key: String,
    #[serde(rename = "duration_ms", with = "duration_ms_f64")]
    pub duration: Duration,
    pub cache_hit: bool,
    pub result_count: Option<usize>,
    /// Wall-clock time of the record in Unix milliseconds
    pub timestamp: u64,
    /// Monotonic time of the record, used for window filtering
    #[serde(skip)]
    pub recorded_at: Instant,
}

/// Append-only, size-capped log of [`QueryMetric`]s
pub struct MetricsRecorder {
    log: Mutex<VecDeque<QueryMetric>>,
    config: MetricsConfig,
}

impl MetricsRecorder {
    pub fn new(config: MetricsConfig) -> Self {
        Self {
            log: Mutex::new(VecDeque::with_capacity(config.max_history.min(1024))),
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(MetricsConfig::default())
    }

    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    /// Append a record, dropping the oldest ones past `max_history`
    pub fn record(
        &self,
        query_key: impl Into<String>,
        duration: Duration,
        cache_hit: bool,
        result_count: Option<usize>,
    ) {
        let metric = QueryMetric {
            query_key: query_key.into(),
            duration,
            cache_hit,
            result_count,
            timestamp: unix_millis(),
            recorded_at: Instant::now(),
        };

        let mut log = self.log.lock();
        log.push_back(metric);
        while log.len() > self.config.max_history {
            log.pop_front();
        }
    }

    /// Report over the configured default window
    pub fn report_default(&self) -> PerformanceReport {
        self.report(self.config.default_window)
    }

    /// Summarize the records younger than `window`
    pub fn report(&self, window: Duration) -> PerformanceReport {
        let now = Instant::now();
        let recent: Vec<QueryMetric> = self
            .log
            .lock()
            .iter()
            .filter(|m| now.saturating_duration_since(m.recorded_at) < window)
            .cloned()
            .collect();

        let total_queries = recent.len();
        if total_queries == 0 {
            return PerformanceReport::default();
        }

        let cache_hits = recent.iter().filter(|m| m.cache_hit).count();
        let total_duration: f64 = recent.iter().map(|m| as_millis_f64(m.duration)).sum();

        let mut slow_queries: Vec<QueryMetric> = recent
            .iter()
            .filter(|m| m.duration > self.config.slow_query_threshold)
            .cloned()
            .collect();
        slow_queries.sort_by(|a, b| b.duration.cmp(&a.duration));
        slow_queries.truncate(self.config.top_n);

        PerformanceReport {
            total_queries,
            average_duration_ms: total_duration / total_queries as f64,
            cache_hit_rate: cache_hits as f64 / total_queries as f64 * 100.0,
            slow_queries,
            top_queries: self.top_queries(&recent),
        }
    }

    /// Most frequent keys by call count; ties keep first-seen order
    fn top_queries(&self, recent: &[QueryMetric]) -> Vec<TopQuery> {
        let mut order: Vec<&str> = Vec::new();
        let mut groups: HashMap<&str, (usize, f64)> = HashMap::new();

        for metric in recent {
            let entry = groups.entry(metric.query_key.as_str()).or_insert_with(|| {
                order.push(metric.query_key.as_str());
                (0, 0.0)
            });
            entry.0 += 1;
            entry.1 += as_millis_f64(metric.duration);
        }

        let mut top: Vec<TopQuery> = order
            .into_iter()
            .map(|key| {
                let (count, total) = groups[key];
                TopQuery {
                    query: key.to_string(),
                    count,
                    avg_duration_ms: total / count as f64,
                }
            })
            .collect();
        top.sort_by(|a, b| b.count.cmp(&a.count));
        top.truncate(self.config.top_n);
        top
    }

    /// Number of retained records
    pub fn len(&self) -> usize {
        self.log.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.lock().is_empty()
    }

    /// Copy of the retained records, oldest first
    pub fn records(&self) -> Vec<QueryMetric> {
        self.log.lock().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.log.lock().clear();
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for MetricsRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRecorder")
            .field("max_history", &self.config.max_history)
            .field("records", &self.len())
            .finish()
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
