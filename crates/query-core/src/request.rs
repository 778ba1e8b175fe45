//! Structured query requests
//!
//! A [`QueryRequest`] describes one remote read: which table, which columns
//! or aggregates, which filters, an optional full-text predicate, ordering
//! and a row limit. Requests are plain values, so cache keys can be derived
//! from their structure instead of from an opaque callable.

use ahash::AHasher;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Aggregation applied to a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "count",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Avg => "avg",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the select list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SelectItem {
    /// Every column of the row
    All,
    Column { name: String },
    Aggregate {
        field: String,
        function: AggregateFunction,
        alias: String,
    },
}

impl SelectItem {
    pub fn column(name: impl Into<String>) -> Self {
        SelectItem::Column { name: name.into() }
    }

    /// Aggregate column aliased to `alias`, or `<function>_<field>` when absent
    pub fn aggregate(
        field: impl Into<String>,
        function: AggregateFunction,
        alias: Option<String>,
    ) -> Self {
        let field = field.into();
        let alias = alias.unwrap_or_else(|| format!("{}_{}", function, field));
        SelectItem::Aggregate {
            field,
            function,
            alias,
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, SelectItem::Aggregate { .. })
    }
}

impl fmt::Display for SelectItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectItem::All => f.write_str("*"),
            SelectItem::Column { name } => f.write_str(name),
            SelectItem::Aggregate {
                field,
                function,
                alias,
            } => write!(f, "{}:{}.{}()", alias, field, function),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
        }
    }
}

/// Column comparison ANDed into the request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

/// Text search dictionary used for ranking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextSearchConfig {
    #[default]
    Simple,
    English,
}

/// Full-text predicate evaluated jointly across `columns`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSearch {
    pub columns: Vec<String>,
    /// Query expression, e.g. `jo:* & smi:*`
    pub query: String,
    #[serde(default)]
    pub config: TextSearchConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn is_ascending(&self) -> bool {
        matches!(self, SortDirection::Asc)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    pub ascending: bool,
}

/// A structured read against one table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub table: String,
    #[serde(default)]
    pub select: Vec<SelectItem>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub text_search: Option<TextSearch>,
    #[serde(default)]
    pub order: Vec<OrderBy>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl QueryRequest {
    /// Request every column of `table`
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            select: Vec::new(),
            filters: Vec::new(),
            text_search: None,
            order: Vec::new(),
            limit: None,
        }
    }

    /// Replace the select list with a comma separated column list (`*` for all)
    pub fn select(mut self, columns: &str) -> Self {
        self.select = columns
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(|c| {
                if c == "*" {
                    SelectItem::All
                } else {
                    SelectItem::column(c)
                }
            })
            .collect();
        self
    }

    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.select.push(SelectItem::column(name));
        self
    }

    pub fn aggregate(
        mut self,
        field: impl Into<String>,
        function: AggregateFunction,
        alias: Option<String>,
    ) -> Self {
        self.select.push(SelectItem::aggregate(field, function, alias));
        self
    }

    pub fn filter(mut self, column: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            column: column.into(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(column, FilterOp::Eq, value)
    }

    pub fn gt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(column, FilterOp::Gt, value)
    }

    pub fn gte(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(column, FilterOp::Gte, value)
    }

    pub fn lt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(column, FilterOp::Lt, value)
    }

    pub fn lte(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(column, FilterOp::Lte, value)
    }

    pub fn text_search(
        mut self,
        columns: Vec<String>,
        query: impl Into<String>,
        config: TextSearchConfig,
    ) -> Self {
        self.text_search = Some(TextSearch {
            columns,
            query: query.into(),
            config,
        });
        self
    }

    pub fn order(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order.push(OrderBy {
            column: column.into(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn is_aggregate(&self) -> bool {
        self.select.iter().any(SelectItem::is_aggregate)
    }

    /// Select list rendered in PostgREST syntax, `*` when empty
    pub fn select_clause(&self) -> String {
        if self.select.is_empty() {
            return "*".to_string();
        }
        self.select
            .iter()
            .map(|item| item.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Structural cache key: `<table>_<hash of the whole request>`
    ///
    /// Two requests that differ in any clause get different keys, and the
    /// table prefix lets `clear_cache("<table>")` drop a table's results.
    pub fn cache_key(&self) -> String {
        let mut hasher = AHasher::default();
        self.table.hash(&mut hasher);
        match serde_json::to_string(self) {
            Ok(encoded) => encoded.hash(&mut hasher),
            Err(_) => format!("{:?}", self).hash(&mut hasher),
        }
        format!("{}_{:016x}", self.table, hasher.finish())
    }
}

impl fmt::Display for QueryRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "select {} from {}", self.select_clause(), self.table)?;
        for filter in &self.filters {
            write!(f, " {}.{}.{}", filter.column, filter.op.as_str(), filter.value)?;
        }
        if let Some(search) = &self.text_search {
            write!(f, " fts({}, '{}')", search.columns.join(", "), search.query)?;
        }
        for order in &self.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            write!(f, " order {}.{}", order.column, direction)?;
        }
        if let Some(limit) = self.limit {
            write!(f, " limit {}", limit)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_select_parsing() {
        let request = QueryRequest::new("patients").select("id, full_name , *");
        assert_eq!(
            request.select,
            vec![
                SelectItem::column("id"),
                SelectItem::column("full_name"),
                SelectItem::All
            ]
        );
        assert_eq!(request.select_clause(), "id, full_name, *");
        assert_eq!(QueryRequest::new("patients").select_clause(), "*");
    }

    #[test]
    fn test_aggregate_alias_default() {
        let item = SelectItem::aggregate("amount", AggregateFunction::Sum, None);
        assert_eq!(item.to_string(), "sum_amount:amount.sum()");

        let named = SelectItem::aggregate("id", AggregateFunction::Count, Some("visits".into()));
        assert_eq!(named.to_string(), "visits:id.count()");
    }

    #[test]
    fn test_cache_key_is_structural() {
        let a = QueryRequest::new("appointments").eq("status", "booked").limit(10);
        let b = QueryRequest::new("appointments").eq("status", "booked").limit(10);
        let c = QueryRequest::new("appointments").eq("status", "cancelled").limit(10);

        assert_eq!(a.cache_key(), b.cache_key());
        assert_ne!(a.cache_key(), c.cache_key());
        assert!(a.cache_key().starts_with("appointments_"));
    }

    #[test]
    fn test_display() {
        let request = QueryRequest::new("bills")
            .select("id, total")
            .gte("total", 100)
            .order("id", false)
            .limit(5);
        assert_eq!(
            request.to_string(),
            "select id, total from bills total.gte.100 order id.desc limit 5"
        );
    }

    #[test]
    fn test_request_serde_shape() {
        let request = QueryRequest::new("patients").eq("active", true);
        let encoded = serde_json::to_value(&request).unwrap();
        assert_eq!(encoded["filters"][0], json!({"column": "active", "op": "eq", "value": true}));
    }
}
