//! Remote data store boundary

use async_trait::async_trait;
use query_core::{QueryRequest, StoreResult};

/// Anything that can answer a structured [`QueryRequest`] with rows
///
/// Implementations perform exactly one logical remote call per `fetch` and
/// report expected failures as an `Err(UpstreamError)` value. The engine
/// enforces deadlines by dropping the returned future.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn fetch(&self, request: &QueryRequest) -> StoreResult;

    /// Short name used in logs
    fn name(&self) -> &str {
        "store"
    }
}
