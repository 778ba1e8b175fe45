//! Aggregate performance reports

use crate::recorder::QueryMetric;
use serde::Serialize;

/// Summary of the executions inside a time window
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PerformanceReport {
    pub total_queries: usize,
    pub average_duration_ms: f64,
    /// Percentage of executions answered from cache, 0 when the window is empty
    pub cache_hit_rate: f64,
    /// Slowest executions above the slow threshold, slowest first
    pub slow_queries: Vec<QueryMetric>,
    /// Most frequently executed keys, most frequent first
    pub top_queries: Vec<TopQuery>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopQuery {
    pub query: String,
    pub count: usize,
    pub avg_duration_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_serializes_for_dashboards() {
        let report = PerformanceReport {
            total_queries: 2,
            average_duration_ms: 12.5,
            cache_hit_rate: 50.0,
            slow_queries: Vec::new(),
            top_queries: vec![TopQuery {
                query: "patients".to_string(),
                count: 2,
                avg_duration_ms: 12.5,
            }],
        };

        let encoded = serde_json::to_value(&report).unwrap();
        assert_eq!(encoded["total_queries"], 2);
        assert_eq!(encoded["top_queries"][0]["query"], "patients");
    }
}
