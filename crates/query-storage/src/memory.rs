//! In-memory data store
//!
//! Holds tables of JSON rows and answers structured requests the way a
//! relational REST gateway would, including its error shape for unknown
//! tables. Used as the reference backend in tests and demos.

use crate::eval::evaluate;
use async_trait::async_trait;
use parking_lot::RwLock;
use query_core::{QueryRequest, StoreResult, UpstreamError};
use query_executor::DataStore;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

/// Postgres error code for an undefined table
const UNDEFINED_TABLE: &str = "42P01";

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Value>>>,
    /// Simulated round-trip time added to every fetch
    latency: Duration,
    fetches: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, name: impl Into<String>, rows: Vec<Value>) -> Self {
        self.insert_table(name, rows);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Create or replace a table
    pub fn insert_table(&self, name: impl Into<String>, rows: Vec<Value>) {
        self.tables.write().insert(name.into(), rows);
    }

    /// Append a row, creating the table if needed
    pub fn insert_row(&self, table: &str, row: Value) {
        self.tables
            .write()
            .entry(table.to_string())
            .or_default()
            .push(row);
    }

    pub fn drop_table(&self, name: &str) -> bool {
        self.tables.write().remove(name).is_some()
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn row_count(&self, table: &str) -> Option<usize> {
        self.tables.read().get(table).map(Vec::len)
    }

    /// Number of fetches served so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn fetch(&self, request: &QueryRequest) -> StoreResult {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let rows = self.tables.read().get(&request.table).cloned();
        let rows = rows.ok_or_else(|| {
            UpstreamError::new(format!("relation \"{}\" does not exist", request.table))
                .with_code(UNDEFINED_TABLE)
        })?;

        debug!("Evaluating [{}] over {} rows", request, rows.len());
        evaluate(request, rows)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
