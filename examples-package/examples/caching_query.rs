//! Query Caching Example
//!
//! Demonstrates the TTL cache, per-call timeouts and cache invalidation.
//!
//! Run with: `cargo run --example caching_query`

use anyhow::Result;
use query_cache::CacheConfig;
use query_core::{QueryConfig, QueryRequest};
use query_examples::{init_logging, patients};
use query_executor::{EngineConfig, QueryEngine};
use query_storage::MemoryStore;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(false);
    println!("=== Query Caching Example ===\n");

    let store = Arc::new(
        MemoryStore::new()
            .with_table("patients", patients(20))
            .with_latency(Duration::from_millis(80)),
    );
    let config = EngineConfig::default()
        .with_cache(CacheConfig::default().with_ttl(Duration::from_millis(500)));
    let engine = QueryEngine::new(store.clone(), config);

    // Example 1: repeated reads
    println!("--- Example 1: Cache hits ---\n");
    let roster = QueryRequest::new("patients").select("id, full_name");
    for attempt in 1..=3 {
        let result = engine.run(&roster, &QueryConfig::default()).await;
        println!(
            "  attempt {}: {} rows in {:.2} ms (cached: {})",
            attempt,
            result.result_count(),
            result.duration_ms(),
            result.cached
        );
    }

    // Example 2: TTL expiry
    println!("\n--- Example 2: TTL expiry ---\n");
    tokio::time::sleep(Duration::from_millis(600)).await;
    let result = engine.run(&roster, &QueryConfig::default()).await;
    println!("  after TTL: cached = {}", result.cached);

    // Example 3: timeouts
    println!("\n--- Example 3: Timeouts ---\n");
    let hurried = QueryConfig::uncached().with_timeout(Duration::from_millis(20));
    let result = engine.run(&roster, &hurried).await;
    match result.error {
        Some(error) => println!("  20 ms deadline: {}", error),
        None => println!("  20 ms deadline: unexpectedly finished"),
    }

    // Example 4: invalidation after a write
    println!("\n--- Example 4: Invalidation ---\n");
    store.insert_row("patients", json!({"id": 21, "full_name": "Nisha Pillai"}));
    let stale = engine.run(&roster, &QueryConfig::default()).await;
    println!("  before clear: {} rows", stale.result_count());
    let removed = engine.clear_cache(Some("patients"));
    let fresh = engine.run(&roster, &QueryConfig::default()).await;
    println!("  cleared {} entries, now {} rows", removed, fresh.result_count());

    println!("\n  Store was called {} times", store.fetch_count());
    println!("\n=== All caching examples completed! ===");
    Ok(())
}
