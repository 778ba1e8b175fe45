use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Message used when a store reports a failure without describing it
const DEFAULT_UPSTREAM_MESSAGE: &str = "Query failed";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("Query timeout after {0}ms")]
    Timeout(u64),

    #[error("Upstream error: {message}")]
    Upstream {
        message: String,
        code: Option<String>,
    },

    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Circular dependency between batch queries: {}", .0.join(", "))]
    CircularDependency(Vec<String>),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification of [`QueryError`] for callers that branch on it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Timeout,
    Upstream,
    Unknown,
    CircularDependency,
    InvalidRequest,
    UnexpectedResponse,
    Config,
}

impl QueryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueryError::Timeout(_) => ErrorKind::Timeout,
            QueryError::Upstream { .. } => ErrorKind::Upstream,
            QueryError::Unknown(_) => ErrorKind::Unknown,
            QueryError::CircularDependency(_) => ErrorKind::CircularDependency,
            QueryError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            QueryError::UnexpectedResponse(_) => ErrorKind::UnexpectedResponse,
            QueryError::Config(_) => ErrorKind::Config,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, QueryError::Timeout(_))
    }
}

/// Error payload reported by a data store
///
/// Mirrors the `{ message, code, details }` shape relational REST gateways
/// answer with. Stores return it as a value; the executor wraps it into
/// [`QueryError::Upstream`].
#[derive(Error, Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[error("{message}")]
pub struct UpstreamError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl UpstreamError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            details: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl From<UpstreamError> for QueryError {
    fn from(err: UpstreamError) -> Self {
        let message = if err.message.trim().is_empty() {
            DEFAULT_UPSTREAM_MESSAGE.to_string()
        } else {
            err.message
        };
        QueryError::Upstream {
            message,
            code: err.code,
        }
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;

/// What a single data store call resolves to
pub type StoreResult = std::result::Result<Value, UpstreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_conversion_keeps_message_and_code() {
        let err: QueryError = UpstreamError::new("relation \"visits\" does not exist")
            .with_code("42P01")
            .into();

        assert_eq!(err.kind(), ErrorKind::Upstream);
        assert_eq!(
            err.to_string(),
            "Upstream error: relation \"visits\" does not exist"
        );
        match err {
            QueryError::Upstream { code, .. } => assert_eq!(code.as_deref(), Some("42P01")),
            _ => panic!("Expected Upstream error"),
        }
    }

    #[test]
    fn test_empty_upstream_message_is_normalized() {
        let err: QueryError = UpstreamError::new("  ").into();
        assert_eq!(err.to_string(), "Upstream error: Query failed");
    }

    #[test]
    fn test_error_display() {
        assert_eq!(QueryError::Timeout(10).to_string(), "Query timeout after 10ms");
        assert!(QueryError::Timeout(10).is_timeout());

        let cycle = QueryError::CircularDependency(vec!["a".into(), "b".into()]);
        assert_eq!(
            cycle.to_string(),
            "Circular dependency between batch queries: a, b"
        );
        assert_eq!(cycle.kind(), ErrorKind::CircularDependency);
    }
}
