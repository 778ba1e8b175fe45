//! Shared setup for the demos: logging and a seeded clinic database

use query_storage::MemoryStore;
use serde_json::{json, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install a `fmt` subscriber; `RUST_LOG` overrides the default filter
pub fn init_logging(verbose: bool) {
    let filter = if verbose {
        "query_examples=debug,query_executor=debug,query_cache=debug,query_storage=debug"
    } else {
        "query_examples=info,query_executor=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

const FIRST_NAMES: &[&str] = &["Asha", "Ravi", "Meera", "Arjun", "Kavya", "Vikram", "Lakshmi"];
const LAST_NAMES: &[&str] = &["Rao", "Iyer", "Menon", "Shankar", "Kumar", "Nair"];

pub fn patients(count: usize) -> Vec<Value> {
    (1..=count)
        .map(|id| {
            let first = FIRST_NAMES[id % FIRST_NAMES.len()];
            let last = LAST_NAMES[id % LAST_NAMES.len()];
            json!({
                "id": id,
                "full_name": format!("{} {}", first, last),
                "phone": format!("98450 {:05}", id),
                "clinic_id": id % 2 + 1,
            })
        })
        .collect()
}

pub fn appointments(count: usize) -> Vec<Value> {
    let statuses = ["booked", "checked_in", "completed", "cancelled"];
    (1..=count)
        .map(|id| {
            json!({
                "id": id,
                "patient_id": id % 40 + 1,
                "doctor_id": id % 3 + 1,
                "status": statuses[id % statuses.len()],
                "day": format!("2024-03-{:02}", id % 28 + 1),
            })
        })
        .collect()
}

pub fn bills(count: usize) -> Vec<Value> {
    (1..=count)
        .map(|id| {
            let status = if id % 9 == 0 { "void" } else { "paid" };
            json!({
                "id": id,
                "doctor_id": id % 3 + 1,
                "amount": 150 + (id * 37) % 600,
                "status": status,
                "issued_on": format!("2024-03-{:02}", id % 28 + 1),
            })
        })
        .collect()
}

/// A store holding patients, appointments and bills
pub fn clinic_store() -> MemoryStore {
    MemoryStore::new()
        .with_table("patients", patients(40))
        .with_table("appointments", appointments(120))
        .with_table("bills", bills(90))
}
