//! Query execution engine
//!
//! Every query goes through [`QueryExecutor`]: cache lookup, the store call
//! raced against a deadline, cache write and one metrics record. The
//! [`QueryEngine`] facade builds on it with dependency-ordered batches,
//! cursor pagination, full-text search and grouped aggregation against a
//! [`DataStore`].
//!
//! # Example
//!
//! ```ignore
//! use query_core::{QueryConfig, QueryRequest};
//! use query_executor::{EngineConfig, QueryEngine};
//!
//! let engine = QueryEngine::new(store, EngineConfig::default());
//! engine.start()?;
//!
//! let today = QueryRequest::new("appointments").eq("day", "2024-03-01");
//! let result = engine.run(&today, &QueryConfig::default()).await;
//! ```

pub mod analytics;
pub mod batch;
pub mod config;
pub mod engine;
pub mod executor;
pub mod pagination;
pub mod search;
pub mod store;
pub mod timeout;

#[cfg(test)]
mod testing;

pub use analytics::{build_aggregate_request, AggregateOptions, DateRange, MetricSpec};
pub use batch::{plan_levels, BatchPlan, BatchQuery, BatchSource, BoxedThunk};
pub use config::{CyclePolicy, EngineConfig};
pub use engine::QueryEngine;
pub use executor::{QueryExecutor, DEFAULT_TIMEOUT};
pub use pagination::{build_page_request, PageOptions};
pub use search::{build_search_expression, build_search_request, SearchOptions};
pub use store::DataStore;
pub use timeout::run_with_timeout;
