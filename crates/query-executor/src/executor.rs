//! Cached, time-boxed query execution
//!
//! [`QueryExecutor::execute`] is the single path every query takes:
//! cache lookup, store call under a deadline, cache write, one metric record.

use crate::timeout::run_with_timeout;
use futures::FutureExt;
use query_cache::{fallback_key, CacheStore};
use query_core::{result_count, QueryConfig, QueryError, QueryResult, StoreResult};
use query_metrics::MetricsRecorder;
use serde_json::Value;
use std::any::Any;
use std::future::Future;
use std::panic::{AssertUnwindSafe, Location};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Default deadline for a store call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct QueryExecutor {
    cache: Arc<CacheStore>,
    metrics: Arc<MetricsRecorder>,
    default_timeout: Duration,
}

impl QueryExecutor {
    pub fn new(
        cache: Arc<CacheStore>,
        metrics: Arc<MetricsRecorder>,
        default_timeout: Duration,
    ) -> Self {
        Self {
            cache,
            metrics,
            default_timeout,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(
            Arc::new(CacheStore::with_defaults()),
            Arc::new(MetricsRecorder::with_defaults()),
            DEFAULT_TIMEOUT,
        )
    }

    /// Execute one store call with caching, a deadline and metrics
    ///
    /// Never fails: timeouts, store errors and panics inside `thunk` all come
    /// back as `QueryResult::error`. Without `config.cache_key` the key is
    /// hashed from the closure's type name and the call site, so it moves
    /// when the calling code moves; pass an explicit key for stable entries.
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
        let caller = Location::caller();
        let cache_key = config.cache_key.clone().unwrap_or_else(|| {
            fallback_key(&format!("{}@{}", std::any::type_name::<F>(), caller))
        });
        self.execute_keyed(cache_key, thunk, config)
    }

    /// Same as [`execute`](Self::execute) with the cache key already resolved
    pub async fn execute_keyed<F, Fut>(
        &self,
        cache_key: String,
        thunk: F,
        config: &QueryConfig,
    ) -> QueryResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = StoreResult>,
    {
        let start = Instant::now();
        let use_cache = config.use_cache && self.cache.is_enabled();

        if use_cache {
            if let Some(data) = self.cache.get(&cache_key) {
                let duration = start.elapsed();
                debug!("Cache hit for {}", cache_key);
                self.metrics
                    .record(&cache_key, duration, true, Some(result_count(&data)));
                return QueryResult::success(data, true, duration);
            }
        }

        let timeout = config.timeout.unwrap_or(self.default_timeout);
        let outcome = AssertUnwindSafe(run_with_timeout(thunk, timeout))
            .catch_unwind()
            .await;
        let duration = start.elapsed();

        let outcome: Result<Value, QueryError> = match outcome {
            Ok(Ok(Ok(data))) => Ok(data),
            Ok(Ok(Err(upstream))) => Err(upstream.into()),
            Ok(Err(timeout_error)) => Err(timeout_error),
            Err(payload) => Err(QueryError::Unknown(panic_message(payload))),
        };

        match outcome {
            Ok(data) => {
                if use_cache && !data.is_null() {
                    let ttl = config
                        .cache_duration
                        .unwrap_or_else(|| self.cache.default_ttl());
                    self.cache.set(cache_key.clone(), data.clone(), ttl);
                }
                debug!("Executed {} in {:?}", cache_key, duration);
                self.metrics
                    .record(&cache_key, duration, false, Some(result_count(&data)));
                QueryResult::success(data, false, duration)
            }
            Err(error) => {
                debug!("Query {} failed: {}", cache_key, error);
                self.metrics.record(&cache_key, duration, false, Some(0));
                QueryResult::failure(error, duration)
            }
        }
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn metrics(&self) -> &Arc<MetricsRecorder> {
        &self.metrics
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Unknown error".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_core::{ErrorKind, UpstreamError};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn keyed(key: &str) -> QueryConfig {
        QueryConfig::new().with_cache_key(key)
    }

    fn rows(data: Value) -> StoreResult {
        Ok(data)
    }

    async fn connection_reset() -> StoreResult {
        panic!("connection reset")
    }

    #[tokio::test]
    async fn test_cache_short_circuits_execution() {
        let executor = QueryExecutor::with_defaults();
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let thunk = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            rows(json!([{"id": 1}, {"id": 2}]))
        };

        let first = executor.execute(thunk, &keyed("patients")).await;
        let second = executor.execute(thunk, &keyed("patients")).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(second.data, Some(json!([{"id": 1}, {"id": 2}])));

        let records = executor.metrics().records();
        assert_eq!(records.len(), 2);
        assert!(!records[0].cache_hit);
        assert!(records[1].cache_hit);
        assert_eq!(records[1].result_count, Some(2));
    }

    #[tokio::test]
    async fn test_cache_disabled_per_call() {
        let executor = QueryExecutor::with_defaults();
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let thunk = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            rows(json!({"total": 3}))
        };
        let config = keyed("stats").with_cache(false);

        executor.execute(thunk, &config).await;
        let second = executor.execute(thunk, &config).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!second.cached);
        assert!(executor.cache().is_empty());
    }

    #[tokio::test]
    async fn test_fallback_key_is_stable_for_one_closure() {
        let executor = QueryExecutor::with_defaults();
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        for _ in 0..2 {
            executor
                .execute(
                    move || async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        rows(json!(1))
                    },
                    &QueryConfig::default(),
                )
                .await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(executor.cache().keys()[0].starts_with("query_"));
    }

    async fn load_two_tables(executor: &QueryExecutor) -> (QueryResult, QueryResult) {
        let patients = executor
            .execute(|| async { rows(json!(["patients"])) }, &QueryConfig::default())
            .await;
        let bills = executor
            .execute(|| async { rows(json!(["bills"])) }, &QueryConfig::default())
            .await;
        (patients, bills)
    }

    #[tokio::test]
    async fn test_fallback_keys_differ_per_call_site() {
        let executor = QueryExecutor::with_defaults();
        let (patients, bills) = load_two_tables(&executor).await;

        assert_eq!(patients.data, Some(json!(["patients"])));
        assert_eq!(bills.data, Some(json!(["bills"])));
        assert!(!bills.cached);
        assert_eq!(executor.cache().len(), 2);
    }

    #[tokio::test]
    async fn test_upstream_error_becomes_value() {
        let executor = QueryExecutor::with_defaults();
        let result = executor
            .execute(
                || async {
                    Err::<Value, _>(UpstreamError::new("permission denied").with_code("42501"))
                },
                &keyed("denied"),
            )
            .await;

        assert!(result.data.is_none());
        assert!(!result.cached);
        let error = result.error.unwrap();
        assert_eq!(error.kind(), ErrorKind::Upstream);
        assert_eq!(error.to_string(), "Upstream error: permission denied");

        // Failures are never cached
        assert!(executor.cache().is_empty());
        assert_eq!(executor.metrics().records()[0].result_count, Some(0));
    }

    #[tokio::test]
    async fn test_panic_becomes_unknown_error() {
        let executor = QueryExecutor::with_defaults();
        let result = executor.execute(connection_reset, &keyed("boom")).await;

        assert_eq!(
            result.error,
            Some(QueryError::Unknown("connection reset".to_string()))
        );
        assert_eq!(executor.metrics().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_then_success() {
        let executor = QueryExecutor::with_defaults();
        let slow = || async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            rows(json!([1, 2, 3]))
        };

        let timed_out = executor
            .execute(slow, &keyed("slow").with_timeout(Duration::from_millis(10)))
            .await;
        assert!(timed_out.data.is_none());
        assert_eq!(
            timed_out.error.as_ref().map(|e| e.kind()),
            Some(ErrorKind::Timeout)
        );

        let completed = executor
            .execute(slow, &keyed("slow").with_timeout(Duration::from_millis(1000)))
            .await;
        assert_eq!(completed.data, Some(json!([1, 2, 3])));
        assert!(completed.error.is_none());
        assert!(!completed.cached);
        assert!(completed.duration >= Duration::from_millis(50));

        let records = executor.metrics().records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].result_count, Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_duration_is_honoured() {
        let executor = QueryExecutor::with_defaults();
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let thunk = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            rows(json!([]))
        };
        let config = keyed("short").with_cache_duration(Duration::from_secs(1));

        executor.execute(thunk, &config).await;
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(executor.execute(thunk, &config).await.cached);

        tokio::time::advance(Duration::from_millis(600)).await;
        assert!(!executor.execute(thunk, &config).await.cached);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_null_payload_is_not_cached() {
        let executor = QueryExecutor::with_defaults();
        let result = executor
            .execute(|| async { rows(Value::Null) }, &keyed("empty"))
            .await;

        assert!(result.data.is_none());
        assert!(result.error.is_none());
        assert!(executor.cache().is_empty());
        assert_eq!(executor.metrics().records()[0].result_count, Some(1));
    }

    #[tokio::test]
    async fn test_concurrent_identical_calls_are_not_deduplicated() {
        let executor = QueryExecutor::with_defaults();
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let thunk = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            rows(json!([1]))
        };

        let herd = keyed("herd");
        let (a, b) = tokio::join!(executor.execute(thunk, &herd), executor.execute(thunk, &herd));

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!a.cached && !b.cached);
    }
}
