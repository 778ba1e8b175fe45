//! Store double shared by the unit tests

use crate::store::DataStore;
use async_trait::async_trait;
use parking_lot::Mutex;
use query_core::{QueryRequest, StoreResult, UpstreamError};
use serde_json::Value;
use std::collections::HashMap;

/// Answers each table with canned rows and keeps every request it saw
#[derive(Default)]
pub(crate) struct RecordingStore {
    tables: HashMap<String, Value>,
    requests: Mutex<Vec<QueryRequest>>,
}

impl RecordingStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_table(mut self, table: &str, rows: Value) -> Self {
        self.tables.insert(table.to_string(), rows);
        self
    }

    pub(crate) fn requests(&self) -> Vec<QueryRequest> {
        self.requests.lock().clone()
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl DataStore for RecordingStore {
    async fn fetch(&self, request: &QueryRequest) -> StoreResult {
        self.requests.lock().push(request.clone());
        match self.tables.get(&request.table) {
            Some(rows) => Ok(rows.clone()),
            None => Err(UpstreamError::new(format!(
                "relation \"{}\" does not exist",
                request.table
            ))
            .with_code("42P01")),
        }
    }

    fn name(&self) -> &str {
        "recording"
    }
}
