//! Storage backends for the query engine
//!
//! [`MemoryStore`] keeps tables of JSON rows in memory and evaluates
//! structured requests against them: filters, prefix text search, grouped
//! aggregates, ordering, limits and projection.

pub mod eval;
pub mod memory;

pub use eval::{compare_values, evaluate};
pub use memory::MemoryStore;
