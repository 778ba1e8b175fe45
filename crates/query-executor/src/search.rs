//! Full-text search requests
//!
//! A free-text term becomes a prefix-matching expression: every whitespace
//! separated token gets a `:*` wildcard and all tokens must match, so
//! `"jo smi"` is searched as `jo:* & smi:*` across the search columns.

use crate::engine::QueryEngine;
use query_core::{QueryConfig, QueryError, QueryRequest, QueryResult, TextSearchConfig};
use serde_json::Value;

pub const DEFAULT_SEARCH_LIMIT: usize = 50;

/// Characters with a meaning in text search expressions
const OPERATOR_CHARS: &[char] = &['&', '|', '!', ':', '*', '(', ')', '\'', '\\'];

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    /// Columns searched jointly
    pub search_fields: Vec<String>,
    /// Comma separated select list, `*` for every column
    pub select_fields: String,
    /// Equality filters; `Null` values are skipped
    pub filters: Vec<(String, Value)>,
    pub limit: usize,
    pub ranking: TextSearchConfig,
    pub query: QueryConfig,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            search_fields: Vec::new(),
            select_fields: "*".to_string(),
            filters: Vec::new(),
            limit: DEFAULT_SEARCH_LIMIT,
            ranking: TextSearchConfig::default(),
            query: QueryConfig::default(),
        }
    }
}

impl SearchOptions {
    pub fn new<I, S>(search_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            search_fields: search_fields.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn select(mut self, fields: impl Into<String>) -> Self {
        self.select_fields = fields.into();
        self
    }

    pub fn filter(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((column.into(), value.into()));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn ranking(mut self, ranking: TextSearchConfig) -> Self {
        self.ranking = ranking;
        self
    }

    pub fn with_query(mut self, query: QueryConfig) -> Self {
        self.query = query;
        self
    }
}

/// Turn a free-text term into a prefix search expression
///
/// Operator characters are stripped from each token; returns `None` when no
/// token is left.
pub fn build_search_expression(term: &str) -> Option<String> {
    let tokens: Vec<String> = term
        .split_whitespace()
        .map(|token| token.chars().filter(|c| !OPERATOR_CHARS.contains(c)).collect::<String>())
        .filter(|token| !token.is_empty())
        .map(|token| format!("{}:*", token))
        .collect();

    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" & "))
    }
}

/// Build the search request for `term` against `table`
pub fn build_search_request(
    table: &str,
    term: &str,
    options: &SearchOptions,
) -> Result<QueryRequest, QueryError> {
    if options.search_fields.is_empty() {
        return Err(QueryError::InvalidRequest(
            "search needs at least one search field".to_string(),
        ));
    }
    let expression = build_search_expression(term).ok_or_else(|| {
        QueryError::InvalidRequest(format!("search term '{}' has no searchable tokens", term))
    })?;

    let mut request = QueryRequest::new(table)
        .select(&options.select_fields)
        .text_search(options.search_fields.clone(), expression, options.ranking)
        .limit(options.limit);

    for (column, value) in &options.filters {
        if !value.is_null() {
            request = request.eq(column.clone(), value.clone());
        }
    }

    Ok(request)
}

impl QueryEngine {
    /// Ranked prefix search over `options.search_fields`
    ///
    /// A term without searchable tokens fails with `InvalidRequest` without
    /// calling the store; the rejected call is still recorded as a miss.
    pub async fn search(&self, table: &str, term: &str, options: &SearchOptions) -> QueryResult {
        match build_search_request(table, term, options) {
            Ok(request) => self.run(&request, &options.query).await,
            Err(error) => {
                let key = options
                    .query
                    .cache_key
                    .clone()
                    .unwrap_or_else(|| format!("search_{}", table));
                self.reject(key, error)
            }
        }
    }
}
