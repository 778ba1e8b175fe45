//! Cache configuration options

use query_core::time::{duration_ms, option_duration_ms};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the result cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether caching is enabled
    pub enabled: bool,
    /// Time-to-live used when a query does not set one
    #[serde(with = "duration_ms")]
    pub default_ttl: Duration,
    /// How often the background sweeper purges expired entries
    #[serde(with = "option_duration_ms")]
    pub sweep_interval: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl: Duration::from_secs(300), // 5 minutes
            sweep_interval: Some(Duration::from_secs(60)),
        }
    }
}

impl CacheConfig {
    /// Create a new cache configuration with a default TTL in seconds
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            default_ttl: Duration::from_secs(ttl_secs),
            ..Default::default()
        }
    }

    /// Create a disabled cache configuration
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Set the default TTL
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set or disable the sweep interval
    pub fn with_sweep_interval(mut self, interval: Option<Duration>) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Enable or disable the cache
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}
