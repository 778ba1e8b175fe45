//! Query engine facade
//!
//! [`QueryEngine`] is the one instance an application builds at start-up and
//! hands to its callers. It owns the cache, the metrics log and the data
//! store, and exposes the caller-facing operations: `execute`, `run`,
//! `execute_batch`, `paginate`, `search`, `aggregate`, `clear_cache` and
//! `get_metrics`.

use crate::config::EngineConfig;
use crate::executor::QueryExecutor;
use crate::store::DataStore;
use parking_lot::Mutex;
use query_cache::{spawn_sweeper, CacheSnapshot, CacheStats, CacheStore};
use query_core::{QueryConfig, QueryError, QueryRequest, QueryResult, Result, StoreResult};
use query_metrics::{MetricsRecorder, PerformanceReport};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub struct QueryEngine {
    executor: QueryExecutor,
    store: Arc<dyn DataStore>,
    config: EngineConfig,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl QueryEngine {
    /// Build a fresh engine with its own cache and metrics log
    pub fn new(store: Arc<dyn DataStore>, config: EngineConfig) -> Self {
        let cache = Arc::new(CacheStore::new(config.cache.clone()));
        let metrics = Arc::new(MetricsRecorder::new(config.metrics.clone()));
        let executor = QueryExecutor::new(cache, metrics, config.default_timeout);

        Self {
            executor,
            store,
            config,
            sweeper: Mutex::new(None),
        }
    }

    pub fn with_store(store: Arc<dyn DataStore>) -> Self {
        Self::new(store, EngineConfig::default())
    }

    /// Start background maintenance
    ///
    /// Spawns the expiry sweeper when `cache.sweep_interval` is set; a zero
    /// interval is a configuration error. Calling `start` on a running engine
    /// is a no-op.
    pub fn start(&self) -> Result<()> {
        let Some(every) = self.config.cache.sweep_interval else {
            return Ok(());
        };

        if every.is_zero() {
            return Err(QueryError::Config(
                "cache.sweep_interval must be greater than zero".to_string(),
            ));
        }

        let mut sweeper = self.sweeper.lock();
        if sweeper.is_some() {
            return Ok(());
        }

        tokio::runtime::Handle::try_current().map_err(|_| {
            QueryError::Config("starting the engine requires a Tokio runtime".to_string())
        })?;

        *sweeper = Some(spawn_sweeper(Arc::clone(self.executor.cache()), every));
        info!(
            "Query engine started on store '{}' (sweep every {:?})",
            self.store.name(),
            every
        );
        Ok(())
    }

    /// Stop the sweeper and drop every cached result
    pub fn shutdown(&self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
        let cleared = self.executor.cache().clear(None);
        info!("Query engine shut down, {} cache entries cleared", cleared);
    }

    /// Whether the background sweeper is running
    pub fn is_running(&self) -> bool {
        self.sweeper.lock().is_some()
    }

    /// Execute an arbitrary store call; see [`QueryExecutor::execute`]
    #[track_caller]
    pub fn execute<'a, F, Fut>(
        &'a self,
        thunk: F,
        config: &'a QueryConfig,
    ) -> impl Future<Output = QueryResult> + 'a
    where
        F: FnOnce() -> Fut + 'a,
        Fut: Future<Output = StoreResult> + 'a,
    {
        self.executor.execute(thunk, config)
    }

    /// Send a structured request to the store
    ///
    /// The cache key is `config.cache_key` when given, otherwise the
    /// request's structural key.
    pub async fn run(&self, request: &QueryRequest, config: &QueryConfig) -> QueryResult {
        let cache_key = config
            .cache_key
            .clone()
            .unwrap_or_else(|| request.cache_key());
        debug!("Running [{}] as {}", request, cache_key);
        self.executor
            .execute_keyed(cache_key, || self.store.fetch(request), config)
            .await
    }

    /// Fail a call before it reaches the store; still records one metric
    pub(crate) fn reject(&self, cache_key: String, error: QueryError) -> QueryResult {
        debug!("Rejected {}: {}", cache_key, error);
        self.executor
            .metrics()
            .record(cache_key, Duration::ZERO, false, Some(0));
        QueryResult::failure(error, Duration::ZERO)
    }

    /// Remove cached results whose key contains `pattern`, or all of them
    pub fn clear_cache(&self, pattern: Option<&str>) -> usize {
        let removed = self.executor.cache().clear(pattern);
        match pattern {
            Some(pattern) => info!("Cleared {} cache entries matching '{}'", removed, pattern),
            None => info!("Cleared all {} cache entries", removed),
        }
        removed
    }

    /// Performance report over the trailing `window`, or the configured default
    pub fn get_metrics(&self, window: Option<Duration>) -> PerformanceReport {
        let metrics = self.executor.metrics();
        match window {
            Some(window) => metrics.report(window),
            None => metrics.report_default(),
        }
    }

    pub fn purge_expired(&self) -> usize {
        self.executor.cache().purge_expired()
    }

    pub fn cache_snapshot(&self) -> CacheSnapshot {
        self.executor.cache().snapshot()
    }

    pub fn cache_stats(&self) -> Arc<CacheStats> {
        self.executor.cache().stats()
    }

    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    pub fn store(&self) -> &Arc<dyn DataStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl Drop for QueryEngine {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.get_mut().take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("store", &self.store.name())
            .field("cache", self.executor.cache())
            .field("running", &self.is_running())
            .finish()
    }
}
