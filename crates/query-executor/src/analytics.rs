//! Grouped aggregation requests

use crate::engine::QueryEngine;
use query_core::{AggregateFunction, QueryConfig, QueryError, QueryRequest, QueryResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One aggregated output column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    pub field: String,
    pub function: AggregateFunction,
    /// Output column name, `<function>_<field>` when absent
    #[serde(default)]
    pub alias: Option<String>,
}

impl MetricSpec {
    pub fn new(field: impl Into<String>, function: AggregateFunction) -> Self {
        Self {
            field: field.into(),
            function,
            alias: None,
        }
    }

    pub fn count(field: impl Into<String>) -> Self {
        Self::new(field, AggregateFunction::Count)
    }

    pub fn sum(field: impl Into<String>) -> Self {
        Self::new(field, AggregateFunction::Sum)
    }

    pub fn avg(field: impl Into<String>) -> Self {
        Self::new(field, AggregateFunction::Avg)
    }

    pub fn min(field: impl Into<String>) -> Self {
        Self::new(field, AggregateFunction::Min)
    }

    pub fn max(field: impl Into<String>) -> Self {
        Self::new(field, AggregateFunction::Max)
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

/// Inclusive `[from, to]` bound on one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub field: String,
    pub from: Value,
    pub to: Value,
}

impl DateRange {
    pub fn new(field: impl Into<String>, from: impl Into<Value>, to: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            from: from.into(),
            to: to.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateOptions {
    pub metrics: Vec<MetricSpec>,
    pub group_by: Vec<String>,
    /// Equality filters; `Null` values are skipped
    pub filters: Vec<(String, Value)>,
    pub date_range: Option<DateRange>,
    /// Column and ascending flag
    pub order_by: Option<(String, bool)>,
    pub limit: Option<usize>,
    pub query: QueryConfig,
}

impl AggregateOptions {
    pub fn new(metrics: Vec<MetricSpec>) -> Self {
        Self {
            metrics,
            ..Default::default()
        }
    }

    pub fn group_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn filter(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((column.into(), value.into()));
        self
    }

    pub fn date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order_by = Some((column.into(), ascending));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_query(mut self, query: QueryConfig) -> Self {
        self.query = query;
        self
    }
}

/// Select the group columns and one aggregate per metric, then filter,
/// order and limit
pub fn build_aggregate_request(
    table: &str,
    options: &AggregateOptions,
) -> Result<QueryRequest, QueryError> {
    if options.metrics.is_empty() {
        return Err(QueryError::InvalidRequest(format!(
            "aggregate on '{}' needs at least one metric",
            table
        )));
    }

    let mut request = QueryRequest::new(table);
    for column in &options.group_by {
        request = request.column(column.clone());
    }
    for metric in &options.metrics {
        request = request.aggregate(metric.field.clone(), metric.function, metric.alias.clone());
    }

    for (column, value) in &options.filters {
        if !value.is_null() {
            request = request.eq(column.clone(), value.clone());
        }
    }

    if let Some(range) = &options.date_range {
        request = request
            .gte(range.field.clone(), range.from.clone())
            .lte(range.field.clone(), range.to.clone());
    }

    if let Some((column, ascending)) = &options.order_by {
        request = request.order(column.clone(), *ascending);
    }

    if let Some(limit) = options.limit {
        request = request.limit(limit);
    }

    Ok(request)
}

impl QueryEngine {
    pub async fn aggregate(&self, table: &str, options: &AggregateOptions) -> QueryResult {
        match build_aggregate_request(table, options) {
            Ok(request) => self.run(&request, &options.query).await,
            Err(error) => {
                let key = options
                    .query
                    .cache_key
                    .clone()
                    .unwrap_or_else(|| format!("aggregate_{}", table));
                self.reject(key, error)
            }
        }
    }
}
