//! Results handed back to callers

use crate::error::{QueryError, Result};
use crate::time::as_millis_f64;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Number of rows a payload represents: array length, otherwise one
pub fn result_count(data: &Value) -> usize {
    match data {
        Value::Array(rows) => rows.len(),
        _ => 1,
    }
}

/// Immutable snapshot of one query execution
///
/// On success `data` is set and `error` is `None`; on failure the reverse.
/// A store that succeeds with a JSON `null` leaves both empty.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub data: Option<Value>,
    pub error: Option<QueryError>,
    /// Whether `data` came from the result cache
    pub cached: bool,
    pub duration: Duration,
}

impl QueryResult {
    pub fn success(data: Value, cached: bool, duration: Duration) -> Self {
        let data = match data {
            Value::Null => None,
            data => Some(data),
        };
        Self {
            data,
            error: None,
            cached,
            duration,
        }
    }

    pub fn failure(error: QueryError, duration: Duration) -> Self {
        Self {
            data: None,
            error: Some(error),
            cached: false,
            duration,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn duration_ms(&self) -> f64 {
        as_millis_f64(self.duration)
    }

    /// Rows of an array payload; empty for failures and non-array payloads
    pub fn rows(&self) -> &[Value] {
        match &self.data {
            Some(Value::Array(rows)) => rows,
            _ => &[],
        }
    }

    pub fn result_count(&self) -> usize {
        match (&self.error, &self.data) {
            (Some(_), _) => 0,
            (None, Some(data)) => result_count(data),
            (None, None) => 1,
        }
    }

    /// Convert into a `Result`, turning a failure into its error
    pub fn into_result(self) -> Result<Option<Value>> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.data),
        }
    }

    /// Deserialize the payload into a typed value
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        let data = self.data.clone().unwrap_or(Value::Null);
        serde_json::from_value(data).map_err(|e| QueryError::UnexpectedResponse(e.to_string()))
    }
}

/// One page of a cursor-paginated query
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Page {
    pub items: Vec<Value>,
    /// Cursor for the next page, present only when `has_more`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Value>,
    pub has_more: bool,
}

impl Page {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
