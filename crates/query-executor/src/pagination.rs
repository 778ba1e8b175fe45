//! Cursor-based pagination
//!
//! Pages are cut by the value of an ordering column rather than by offset:
//! the next page holds rows strictly beyond the last row already returned.
//! One extra row is requested to learn whether another page exists.

use crate::engine::QueryEngine;
use query_core::{
    FilterOp, OrderBy, Page, QueryConfig, QueryError, QueryRequest, Result, SortDirection,
};
use serde_json::Value;
use tracing::debug;

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const DEFAULT_CURSOR_FIELD: &str = "id";

#[derive(Debug, Clone, PartialEq)]
pub struct PageOptions {
    pub page_size: usize,
    /// Cursor field value of the last row seen; `None` for the first page
    pub cursor: Option<Value>,
    pub cursor_field: String,
    pub direction: SortDirection,
    pub query: QueryConfig,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            cursor: None,
            cursor_field: DEFAULT_CURSOR_FIELD.to_string(),
            direction: SortDirection::Desc,
            query: QueryConfig::default(),
        }
    }
}

impl PageOptions {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            ..Default::default()
        }
    }

    pub fn with_cursor(mut self, cursor: Option<Value>) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn with_cursor_field(mut self, field: impl Into<String>) -> Self {
        self.cursor_field = field.into();
        self
    }

    pub fn with_direction(mut self, direction: SortDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_query(mut self, query: QueryConfig) -> Self {
        self.query = query;
        self
    }

    /// Options for the page following `page`, or `None` after the last one
    pub fn next(&self, page: &Page) -> Option<Self> {
        page.next_cursor.as_ref().map(|cursor| Self {
            cursor: Some(cursor.clone()),
            ..self.clone()
        })
    }
}

/// Apply cursor ordering, the cursor bound and the over-fetch limit to `base`
///
/// The cursor column becomes the primary sort key; an existing ordering on
/// the same column is replaced.
pub fn build_page_request(base: &QueryRequest, options: &PageOptions) -> QueryRequest {
    let mut request = base.clone();
    let ascending = options.direction.is_ascending();

    request.order.retain(|o| o.column != options.cursor_field);
    request.order.insert(
        0,
        OrderBy {
            column: options.cursor_field.clone(),
            ascending,
        },
    );

    if let Some(cursor) = options.cursor.as_ref().filter(|c| !c.is_null()) {
        let op = if ascending { FilterOp::Gt } else { FilterOp::Lt };
        request = request.filter(options.cursor_field.clone(), op, cursor.clone());
    }

    request.limit(options.page_size.saturating_add(1))
}

impl QueryEngine {
    /// Fetch one page of `base`
    ///
    /// Store failures are returned as `Err`; callers that prefer an empty
    /// page can use `unwrap_or_default()`.
    pub async fn paginate(&self, base: &QueryRequest, options: &PageOptions) -> Result<Page> {
        if options.page_size == 0 {
            return Err(QueryError::InvalidRequest(
                "page size must be at least 1".to_string(),
            ));
        }

        let request = build_page_request(base, options);
        let result = self.run(&request, &options.query).await;
        let mut items = match result.into_result()? {
            None => return Ok(Page::default()),
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(QueryError::UnexpectedResponse(format!(
                    "expected an array of rows from '{}', got {}",
                    base.table, other
                )))
            }
        };

        let has_more = items.len() > options.page_size;
        items.truncate(options.page_size);

        let next_cursor = if has_more {
            items
                .last()
                .and_then(|row| row.get(&options.cursor_field))
                .cloned()
        } else {
            None
        };

        debug!(
            "Page of {} from '{}' (has_more: {})",
            items.len(),
            base.table,
            has_more
        );

        Ok(Page {
            items,
            next_cursor,
            has_more,
        })
    }
}
