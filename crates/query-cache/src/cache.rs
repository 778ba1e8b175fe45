//! TTL result cache implementation

use crate::config::CacheConfig;
use crate::stats::{CacheSnapshot, CacheStats};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Upper bound for TTLs that would overflow the clock
const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Entry stored in the cache
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    /// Cached query payload
    pub data: Value,
    /// When this entry was written
    pub created_at: Instant,
    /// `created_at + ttl`
    pub expires_at: Instant,
}

impl CacheEntry {
    /// Create a new cache entry that lives for `ttl`
    pub fn new(key: impl Into<String>, data: Value, ttl: Duration) -> Self {
        let created_at = Instant::now();
        let expires_at = created_at
            .checked_add(ttl)
            .unwrap_or_else(|| created_at + MAX_TTL);
        Self {
            key: key.into(),
            data,
            created_at,
            expires_at,
        }
    }

    /// An entry is valid strictly before its expiry instant
    pub fn is_valid_at(&self, now: Instant) -> bool {
        now < self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        !self.is_valid_at(Instant::now())
    }

    /// Get the age of this entry
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

/// Thread-safe TTL store of query results keyed by string
pub struct CacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
    config: CacheConfig,
    stats: Arc<CacheStats>,
}

impl CacheStore {
    /// Create a new cache with the given configuration
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            config,
            stats: Arc::new(CacheStats::new()),
        }
    }

    /// Create a cache with default configuration
    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    /// Check if caching is enabled
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// TTL applied when a caller does not choose one
    pub fn default_ttl(&self) -> Duration {
        self.config.default_ttl
    }

    /// Look up a valid entry
    ///
    /// An expired entry is removed before the miss is reported.
    pub fn get(&self, key: &str) -> Option<Value> {
        if !self.config.enabled {
            return None;
        }

        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if entry.is_valid_at(Instant::now()) => {
                    self.stats.record_hit();
                    return Some(entry.data.clone());
                }
                Some(_) => {}
                None => {
                    self.stats.record_miss();
                    return None;
                }
            }
        }

        // The entry was expired under the read lock; re-check before evicting
        // since a writer may have refreshed it in between.
        let mut entries = self.entries.write();
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if entry.is_valid_at(now) => {
                self.stats.record_hit();
                Some(entry.data.clone())
            }
            Some(_) => {
                entries.remove(key);
                self.stats.record_expirations(1);
                self.stats.record_miss();
                debug!("Evicted expired cache entry: {}", key);
                None
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    /// Insert or overwrite an entry
    pub fn set(&self, key: impl Into<String>, data: Value, ttl: Duration) {
        if !self.config.enabled {
            return;
        }

        let entry = CacheEntry::new(key, data, ttl);
        self.entries.write().insert(entry.key.clone(), entry);
        self.stats.record_insertion();
    }

    /// Remove every key containing `pattern`, or every key when `None`
    ///
    /// Returns the number of removed entries.
    pub fn clear(&self, pattern: Option<&str>) -> usize {
        let removed = {
            let mut entries = self.entries.write();
            match pattern {
                Some(pattern) => {
                    let before = entries.len();
                    entries.retain(|key, _| !key.contains(pattern));
                    before - entries.len()
                }
                None => {
                    let count = entries.len();
                    entries.clear();
                    count
                }
            }
        };

        self.stats.record_invalidations(removed as u64);
        removed
    }

    /// Drop every entry whose TTL has run out
    pub fn purge_expired(&self) -> usize {
        let expired = {
            let mut entries = self.entries.write();
            let now = Instant::now();
            let before = entries.len();
            entries.retain(|_, entry| entry.is_valid_at(now));
            before - entries.len()
        };

        if expired > 0 {
            self.stats.record_expirations(expired as u64);
        }
        expired
    }

    /// Count valid and expired entries and estimate their size
    pub fn snapshot(&self) -> CacheSnapshot {
        let entries = self.entries.read();
        let now = Instant::now();
        let valid_entries = entries.values().filter(|e| e.is_valid_at(now)).count();
        let approx_bytes = entries
            .values()
            .map(|e| e.key.len() + serde_json::to_string(&e.data).map(|s| s.len()).unwrap_or(0))
            .sum();

        CacheSnapshot {
            total_entries: entries.len(),
            valid_entries,
            expired_entries: entries.len() - valid_entries,
            approx_bytes,
        }
    }

    /// Sorted list of the stored keys, expired ones included
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Get cache statistics
    pub fn stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }

    /// Get current number of entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Get the cache configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("enabled", &self.config.enabled)
            .field("default_ttl", &self.config.default_ttl)
            .field("current_entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread;

    #[test]
    fn test_cache_set_get() {
        let cache = CacheStore::with_defaults();
        cache.set("patients_all", json!([{"id": 1}]), Duration::from_secs(60));

        assert_eq!(cache.get("patients_all"), Some(json!([{"id": 1}])));
        assert_eq!(cache.stats().hits(), 1);
    }

    #[test]
    fn test_cache_miss() {
        let cache = CacheStore::with_defaults();

        assert!(cache.get("nonexistent").is_none());
        assert_eq!(cache.stats().misses(), 1);
    }

    #[test]
    fn test_set_overwrites() {
        let cache = CacheStore::with_defaults();
        cache.set("k", json!(1), Duration::from_secs(60));
        cache.set("k", json!(2), Duration::from_secs(60));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("k"), Some(json!(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiration() {
        let cache = CacheStore::with_defaults();
        let ttl = Duration::from_millis(50);
        cache.set("k", json!("v"), ttl);

        // Valid right up to the expiry instant
        tokio::time::advance(Duration::from_millis(49)).await;
        assert_eq!(cache.get("k"), Some(json!("v")));

        tokio::time::advance(Duration::from_millis(2)).await;
        assert!(cache.get("k").is_none());
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats().expirations(), 1);

        // No stale residue: the key can be written again
        cache.set("k", json!("fresh"), ttl);
        assert_eq!(cache.get("k"), Some(json!("fresh")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_boundary_is_exclusive() {
        let cache = CacheStore::with_defaults();
        cache.set("k", json!(1), Duration::from_millis(100));

        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_zero_ttl_is_never_served() {
        let cache = CacheStore::with_defaults();
        cache.set("k", json!(1), Duration::ZERO);
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_clear_pattern() {
        let cache = CacheStore::with_defaults();
        let ttl = Duration::from_secs(60);
        cache.set("patients_foo", json!(1), ttl);
        cache.set("foo_bills", json!(2), ttl);
        cache.set("appointments", json!(3), ttl);

        let removed = cache.clear(Some("foo"));

        assert_eq!(removed, 2);
        assert_eq!(cache.keys(), vec!["appointments".to_string()]);
        assert_eq!(cache.stats().invalidations(), 2);
    }

    #[test]
    fn test_clear_all() {
        let cache = CacheStore::with_defaults();
        for i in 0..10 {
            cache.set(format!("key_{}", i), json!(i), Duration::from_secs(60));
        }

        assert_eq!(cache.clear(None), 10);
        assert!(cache.is_empty());
        for i in 0..10 {
            assert!(cache.get(&format!("key_{}", i)).is_none());
        }
    }

    #[test]
    fn test_cache_disabled() {
        let cache = CacheStore::new(CacheConfig::disabled());
        cache.set("k", json!(1), Duration::from_secs(60));

        assert_eq!(cache.len(), 0);
        assert!(cache.get("k").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_and_snapshot() {
        let cache = CacheStore::with_defaults();
        cache.set("short_a", json!([1, 2]), Duration::from_millis(10));
        cache.set("short_b", json!([3]), Duration::from_millis(10));
        cache.set("long", json!({"total": 5}), Duration::from_secs(60));

        tokio::time::advance(Duration::from_millis(20)).await;

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.total_entries, 3);
        assert_eq!(snapshot.valid_entries, 1);
        assert_eq!(snapshot.expired_entries, 2);
        assert!(snapshot.approx_bytes > 0);

        assert_eq!(cache.purge_expired(), 2);
        assert_eq!(cache.keys(), vec!["long".to_string()]);
        assert_eq!(cache.stats().expirations(), 2);
    }

    #[test]
    fn test_concurrent_access() {
        let cache = Arc::new(CacheStore::with_defaults());
        let mut handles = vec![];

        for i in 0..10 {
            let cache_clone = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                let key = format!("visits_{}", i);
                cache_clone.set(key.clone(), json!(i), Duration::from_secs(60));
                cache_clone.get(&key);
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 10);
        assert_eq!(cache.stats().hits(), 10);
    }
}
