//! Background purge of expired entries

use crate::cache::CacheStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Spawn a task that calls [`CacheStore::purge_expired`] every `every`
///
/// Must be called from within a Tokio runtime with a non-zero `every`. The
/// task runs until the returned handle is aborted.
pub fn spawn_sweeper(cache: Arc<CacheStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let purged = cache.purge_expired();
            if purged > 0 {
                debug!("Cache sweeper purged {} expired entries", purged);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_purges_expired_entries() {
        let cache = Arc::new(CacheStore::with_defaults());
        cache.set("stale", json!(1), Duration::from_millis(10));
        cache.set("fresh", json!(2), Duration::from_secs(3600));

        let handle = spawn_sweeper(Arc::clone(&cache), Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(61)).await;

        assert_eq!(cache.keys(), vec!["fresh".to_string()]);
        handle.abort();
    }
}
