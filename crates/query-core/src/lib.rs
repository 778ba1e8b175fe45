//! Core types for the query orchestration engine
//!
//! Everything the other crates agree on lives here: the error taxonomy,
//! the structured [`QueryRequest`] model sent to a data store, the
//! [`QueryResult`] snapshot returned to callers and the per-call
//! [`QueryConfig`].

pub mod config;
pub mod error;
pub mod request;
pub mod result;
pub mod time;

pub use config::QueryConfig;
pub use error::{ErrorKind, QueryError, Result, StoreResult, UpstreamError};
pub use request::{
    AggregateFunction, Filter, FilterOp, OrderBy, QueryRequest, SelectItem, SortDirection,
    TextSearch, TextSearchConfig,
};
pub use result::{result_count, Page, QueryResult};
