//! Clinic Dashboard Example
//!
//! Loads a dashboard as one dependency-ordered batch, then prints revenue
//! per doctor, cache statistics and the performance report.
//!
//! Run with: `cargo run --example clinic_dashboard`

use anyhow::Result;
use query_core::{AggregateFunction, QueryConfig, QueryRequest};
use query_examples::{clinic_store, init_logging};
use query_executor::{
    AggregateOptions, BatchQuery, DateRange, EngineConfig, MetricSpec, QueryEngine,
};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(false);
    println!("=== Clinic Dashboard Example ===\n");

    let engine = QueryEngine::new(Arc::new(clinic_store()), EngineConfig::default());
    engine.start()?;

    load_dashboard(&engine).await?;
    revenue_per_doctor(&engine).await?;

    // Second load is answered from the cache
    load_dashboard(&engine).await?;
    print_statistics(&engine)?;

    engine.shutdown();
    println!("\n=== Dashboard example completed! ===");
    Ok(())
}

async fn load_dashboard(engine: &QueryEngine) -> Result<()> {
    println!("--- Loading dashboard ---\n");

    let queries = vec![
        BatchQuery::request(
            "todays_appointments",
            QueryRequest::new("appointments")
                .eq("day", "2024-03-05")
                .order("id", true),
        ),
        BatchQuery::request(
            "patients_seen",
            QueryRequest::new("appointments")
                .eq("status", "completed")
                .aggregate("*", AggregateFunction::Count, Some("seen".to_string())),
        )
        .depends_on(["todays_appointments"]),
        BatchQuery::request(
            "revenue",
            QueryRequest::new("bills")
                .eq("status", "paid")
                .aggregate("amount", AggregateFunction::Sum, Some("total".to_string())),
        )
        .depends_on(["patients_seen"]),
        BatchQuery::thunk("queue", || async { Ok(json!({"waiting": 4, "in_consultation": 2})) }),
    ];

    let results = engine.execute_batch(queries, &QueryConfig::default()).await;

    let mut names: Vec<&String> = results.keys().collect();
    names.sort();
    for name in names {
        let result = &results[name];
        match &result.error {
            Some(error) => println!("  {:<20} failed: {}", name, error),
            None => println!(
                "  {:<20} {} rows ({:.2} ms{})",
                name,
                result.result_count(),
                result.duration_ms(),
                if result.cached { ", cached" } else { "" }
            ),
        }
    }
    println!();
    Ok(())
}

async fn revenue_per_doctor(engine: &QueryEngine) -> Result<()> {
    println!("--- Revenue per doctor, March 2024 ---\n");

    let options = AggregateOptions::new(vec![
        MetricSpec::sum("amount").alias("revenue"),
        MetricSpec::count("id").alias("bills"),
        MetricSpec::avg("amount"),
    ])
    .group_by(["doctor_id"])
    .filter("status", "paid")
    .date_range(DateRange::new("issued_on", "2024-03-01", "2024-03-31"))
    .order_by("revenue", false);

    let result = engine.aggregate("bills", &options).await;
    let rows = result.into_result()?.unwrap_or_default();
    println!("{}\n", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

fn print_statistics(engine: &QueryEngine) -> Result<()> {
    println!("--- Cache ---\n");
    let snapshot = engine.cache_snapshot();
    let stats = engine.cache_stats();
    println!("  Entries:   {} ({} valid)", snapshot.total_entries, snapshot.valid_entries);
    println!("  Size:      ~{} bytes", snapshot.approx_bytes);
    println!("  Hits:      {}", stats.hits());
    println!("  Misses:    {}", stats.misses());
    println!("  Hit Rate:  {:.1}%", stats.hit_rate() * 100.0);

    println!("\n--- Performance report ---\n");
    let report = engine.get_metrics(None);
    info!("{} queries recorded", report.total_queries);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
