//! Per-call query configuration

use crate::time::option_duration_ms;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Options for a single query execution
///
/// `None` fields fall back to the engine defaults (5 minute cache TTL,
/// 30 second timeout unless configured otherwise).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Whether the result cache is consulted and written
    pub use_cache: bool,
    /// Explicit cache key; derived from the query identity when absent
    pub cache_key: Option<String>,
    /// Time-to-live for a cached result
    #[serde(with = "option_duration_ms")]
    pub cache_duration: Option<Duration>,
    /// Deadline for the underlying store call
    #[serde(with = "option_duration_ms")]
    pub timeout: Option<Duration>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            use_cache: true,
            cache_key: None,
            cache_duration: None,
            timeout: None,
        }
    }
}

impl QueryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration that bypasses the cache entirely
    pub fn uncached() -> Self {
        Self {
            use_cache: false,
            ..Default::default()
        }
    }

    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    pub fn with_cache_duration(mut self, ttl: Duration) -> Self {
        self.cache_duration = Some(ttl);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }
}
