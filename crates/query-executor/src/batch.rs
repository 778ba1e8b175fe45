//! Dependency-ordered batch execution
//!
//! A batch is a set of named queries, each naming the queries it depends on.
//! [`plan_levels`] sorts them into levels (Kahn's algorithm): a level holds
//! every query whose dependencies have all settled. Levels run one after the
//! other, the queries inside a level run concurrently.

use crate::config::CyclePolicy;
use crate::engine::QueryEngine;
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use query_cache::batch_key;
use query_core::{QueryConfig, QueryError, QueryRequest, QueryResult, StoreResult};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Type-erased store call owned by a batch entry
pub type BoxedThunk = Box<dyn FnOnce() -> BoxFuture<'static, StoreResult> + Send>;

/// What a batch entry runs
pub enum BatchSource {
    /// A structured request sent to the engine's store
    Request(QueryRequest),
    /// An arbitrary store call
    Thunk(BoxedThunk),
}

impl fmt::Debug for BatchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchSource::Request(request) => f.debug_tuple("Request").field(request).finish(),
            BatchSource::Thunk(_) => f.write_str("Thunk(..)"),
        }
    }
}

/// One named entry of a batch
#[derive(Debug)]
pub struct BatchQuery {
    name: String,
    dependencies: Vec<String>,
    source: BatchSource,
}

impl BatchQuery {
    pub fn request(name: impl Into<String>, request: QueryRequest) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            source: BatchSource::Request(request),
        }
    }

    pub fn thunk<F, Fut>(name: impl Into<String>, thunk: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = StoreResult> + Send + 'static,
    {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            source: BatchSource::Thunk(Box::new(move || thunk().boxed())),
        }
    }

    /// Declare queries of the same batch that must settle first
    pub fn depends_on<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            if !self.dependencies.contains(&name) {
                self.dependencies.push(name);
            }
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }
}

/// Execution order of a batch, as indices into the planned slice
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchPlan {
    /// Levels in execution order; indices inside a level are ascending
    pub levels: Vec<Vec<usize>>,
    /// Queries left over when no query was ready, in declaration order
    pub cyclic: Vec<usize>,
}

impl BatchPlan {
    pub fn has_cycle(&self) -> bool {
        !self.cyclic.is_empty()
    }
}

/// Level the queries topologically
///
/// A query's in-degree is the number of its dependencies that name a query
/// of this batch; unknown names are ignored. After each level, every
/// remaining query that depends on a member of that level has its in-degree
/// decremented. When queries remain but none has in-degree zero, they are
/// cyclic and reported in `cyclic` instead of a level.
pub fn plan_levels(queries: &[BatchQuery]) -> BatchPlan {
    let known: HashSet<&str> = queries.iter().map(|q| q.name.as_str()).collect();

    let mut in_degree: Vec<usize> = queries
        .iter()
        .map(|query| {
            query
                .dependencies
                .iter()
                .filter(|dep| {
                    let found = known.contains(dep.as_str());
                    if !found {
                        warn!(
                            "Batch query '{}' depends on unknown query '{}', ignoring",
                            query.name, dep
                        );
                    }
                    found
                })
                .count()
        })
        .collect();

    let mut done = vec![false; queries.len()];
    let mut plan = BatchPlan::default();

    loop {
        let level: Vec<usize> = (0..queries.len())
            .filter(|&i| !done[i] && in_degree[i] == 0)
            .collect();

        if level.is_empty() {
            plan.cyclic = (0..queries.len()).filter(|&i| !done[i]).collect();
            break;
        }

        for &i in &level {
            done[i] = true;
        }
        for &i in &level {
            let name = &queries[i].name;
            for (j, query) in queries.iter().enumerate() {
                if !done[j] && query.dependencies.contains(name) {
                    in_degree[j] -= 1;
                }
            }
        }
        plan.levels.push(level);
    }

    plan
}

impl QueryEngine {
    /// Run a batch level by level and collect every result by name
    ///
    /// Each query is executed with the cache key `batch_<name>`. A failed
    /// query still counts as settled for its dependents. A name repeated
    /// within the batch keeps its first occurrence; each later one gets an
    /// `InvalidRequest` result under `error_<index>`.
    pub async fn execute_batch(
        &self,
        queries: Vec<BatchQuery>,
        config: &QueryConfig,
    ) -> HashMap<String, QueryResult> {
        let mut results = HashMap::with_capacity(queries.len());
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(queries.len());

        for (index, query) in queries.into_iter().enumerate() {
            if seen.insert(query.name.clone()) {
                unique.push(query);
            } else {
                warn!("Duplicate batch query name '{}'", query.name);
                let error =
                    QueryError::InvalidRequest(format!("duplicate batch query name '{}'", query.name));
                results.insert(
                    format!("error_{}", index),
                    QueryResult::failure(error, Duration::ZERO),
                );
            }
        }

        let plan = plan_levels(&unique);
        let mut slots: Vec<Option<BatchQuery>> = unique.into_iter().map(Some).collect();

        for (depth, level) in plan.levels.iter().enumerate() {
            debug!("Running batch level {} ({} queries)", depth, level.len());
            let runs = level
                .iter()
                .filter_map(|&i| slots[i].take())
                .map(|query| self.run_batch_query(query, config));
            results.extend(join_all(runs).await);
        }

        if plan.has_cycle() {
            let cyclic: Vec<BatchQuery> = plan
                .cyclic
                .iter()
                .filter_map(|&i| slots[i].take())
                .collect();
            let names: Vec<String> = cyclic.iter().map(|q| q.name.clone()).collect();

            match self.config().cycle_policy {
                CyclePolicy::RunRemaining => {
                    warn!(
                        "Circular dependency between batch queries [{}], running them together",
                        names.join(", ")
                    );
                    let runs = cyclic
                        .into_iter()
                        .map(|query| self.run_batch_query(query, config));
                    results.extend(join_all(runs).await);
                }
                CyclePolicy::Fail => {
                    warn!(
                        "Circular dependency between batch queries [{}], not running them",
                        names.join(", ")
                    );
                    for name in &names {
                        let error = QueryError::CircularDependency(names.clone());
                        results.insert(name.clone(), QueryResult::failure(error, Duration::ZERO));
                    }
                }
            }
        }

        results
    }

    async fn run_batch_query(&self, query: BatchQuery, config: &QueryConfig) -> (String, QueryResult) {
        let cache_key = batch_key(&query.name);
        let config = config.clone().with_cache_key(cache_key.clone());

        let result = match query.source {
            BatchSource::Request(request) => self.run(&request, &config).await,
            BatchSource::Thunk(thunk) => {
                self.executor()
                    .execute_keyed(cache_key, thunk, &config)
                    .await
            }
        };
        (query.name, result)
    }
}
