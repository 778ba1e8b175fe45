//! Patient Search Example
//!
//! Prefix search over patient names and phone numbers, then cursor
//! pagination through the appointment log.
//!
//! Run with: `cargo run --example patient_search -- <term>`

use anyhow::Result;
use query_core::{QueryRequest, TextSearchConfig};
use query_examples::{clinic_store, init_logging};
use query_executor::{PageOptions, QueryEngine, SearchOptions};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(false);
    println!("=== Patient Search Example ===\n");

    let term = std::env::args().nth(1).unwrap_or_else(|| "asha".to_string());
    let engine = QueryEngine::with_store(Arc::new(clinic_store()));

    search_patients(&engine, &term).await?;
    page_through_appointments(&engine).await?;

    println!("\n=== Search example completed! ===");
    Ok(())
}

async fn search_patients(engine: &QueryEngine, term: &str) -> Result<()> {
    println!("--- Searching for '{}' ---\n", term);

    let options = SearchOptions::new(["full_name", "phone"])
        .select("id, full_name, phone")
        .filter("clinic_id", 1)
        .ranking(TextSearchConfig::Simple)
        .limit(10);

    let result = engine.search("patients", term, &options).await;
    if let Some(error) = &result.error {
        println!("Search failed: {}", error);
        return Ok(());
    }

    for row in result.rows() {
        println!("  #{:<4} {:<20} {}", row["id"], row["full_name"], row["phone"]);
    }
    println!("\n{} matches in {:.2} ms\n", result.result_count(), result.duration_ms());
    Ok(())
}

async fn page_through_appointments(engine: &QueryEngine) -> Result<()> {
    println!("--- Booked appointments, newest first ---\n");

    let base = QueryRequest::new("appointments")
        .select("id, patient_id, day")
        .eq("status", "booked");
    let mut options = PageOptions::new(10);
    let mut page_number = 1;

    loop {
        let page = engine.paginate(&base, &options).await?;
        let ids: Vec<String> = page.items.iter().map(|row| row["id"].to_string()).collect();
        println!("  page {}: [{}]", page_number, ids.join(", "));

        match options.next(&page) {
            Some(next) => options = next,
            None => break,
        }
        page_number += 1;
    }
    Ok(())
}
