//! Engine configuration

use crate::executor::DEFAULT_TIMEOUT;
use query_cache::CacheConfig;
use query_core::time::duration_ms;
use query_core::{QueryError, Result};
use query_metrics::MetricsConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// What a batch does with descriptors caught in a dependency cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePolicy {
    /// Run all of them together as one final level, in declaration order
    #[default]
    RunRemaining,
    /// Report `CircularDependency` for each of them without running any
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    pub metrics: MetricsConfig,
    /// Deadline for a store call when the query does not set one
    #[serde(with = "duration_ms")]
    pub default_timeout: Duration,
    pub cycle_policy: CyclePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            metrics: MetricsConfig::default(),
            default_timeout: DEFAULT_TIMEOUT,
            cycle_policy: CyclePolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Load a JSON configuration file; missing fields keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| QueryError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents).map_err(|e| QueryError::Config(e.to_string()))
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsConfig) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_cycle_policy(mut self, policy: CyclePolicy) -> Self {
        self.cycle_policy = policy;
        self
    }
}
