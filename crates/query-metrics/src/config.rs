//! Metrics configuration options

use query_core::time::duration_ms;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Maximum number of retained records
    pub max_history: usize,
    /// Executions slower than this are reported as slow
    #[serde(with = "duration_ms")]
    pub slow_query_threshold: Duration,
    /// Length of the slow and top query lists
    pub top_n: usize,
    /// Window used when a report does not name one
    #[serde(with = "duration_ms")]
    pub default_window: Duration,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            max_history: 1000,
            slow_query_threshold: Duration::from_millis(1000),
            top_n: 10,
            default_window: Duration::from_secs(3600), // 1 hour
        }
    }
}

impl MetricsConfig {
    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = threshold;
        self
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn with_default_window(mut self, window: Duration) -> Self {
        self.default_window = window;
        self
    }
}
