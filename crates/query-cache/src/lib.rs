//! TTL Query Result Cache for the query orchestration engine
//!
//! This crate stores the results of prior queries under a string key until
//! their time-to-live runs out.
//!
//! # Features
//!
//! - **TTL Expiry**: an entry is valid while `now < expires_at`; expired entries
//!   are evicted on read, by [`CacheStore::purge_expired`] or by the sweeper
//! - **Pattern Clear**: drop every key containing a substring, or everything
//! - **Thread-Safe**: guarded by a `parking_lot::RwLock`
//! - **Statistics**: hits, misses, expirations, insertions and invalidations
//!
//! There is no size bound and no LRU: memory grows with the number of
//! distinct keys cached under long TTLs.
//!
//! # Example
//!
//! ```ignore
//! use query_cache::{CacheConfig, CacheStore};
//! use std::time::Duration;
//!
//! let cache = CacheStore::new(CacheConfig::default());
//! cache.set("patients_today", rows, Duration::from_secs(60));
//!
//! if let Some(rows) = cache.get("patients_today") {
//!     return Ok(rows);
//! }
//! ```

pub mod cache;
pub mod config;
pub mod key;
pub mod stats;
pub mod sweeper;

pub use cache::{CacheEntry, CacheStore};
pub use config::CacheConfig;
pub use key::{batch_key, fallback_key};
pub use stats::{CacheSnapshot, CacheStats};
pub use sweeper::spawn_sweeper;
