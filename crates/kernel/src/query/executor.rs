//! Query execution: find, count, exists.
//!
//! The engine resolves and compiles a spec per call and hands the resulting
//! statements to the caller-supplied [`EntityStore`]. Nothing about a query
//! outlives the call; only pure path resolutions are memoized.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use super::error::{QueryError, QueryResult};
use super::path::PathResolver;
use super::plan::{QueryPlan, VALUE_COLUMN};
use super::schema::EntityRegistry;
use super::types::{Page, QuerySpec};
use crate::store::EntityStore;

/// Dynamic query engine over an entity registry.
pub struct QueryEngine {
    resolver: PathResolver,
}

impl QueryEngine {
    /// Create an engine with the default path cache capacity.
    pub fn new(registry: Arc<EntityRegistry>) -> Self {
        Self {
            resolver: PathResolver::new(registry),
        }
    }

    /// Create an engine with an explicit path cache capacity.
    pub fn with_path_cache_capacity(registry: Arc<EntityRegistry>, capacity: u64) -> Self {
        Self {
            resolver: PathResolver::with_capacity(registry, capacity),
        }
    }

    pub fn registry(&self) -> &EntityRegistry {
        self.resolver.registry()
    }

    /// Resolve and compile a spec without running it.
    pub fn compile(&self, spec: &QuerySpec) -> QueryResult<QueryPlan> {
        QueryPlan::prepare(spec, &self.resolver)
    }

    /// Matching rows of the target type, sorted and paginated.
    pub async fn find<S>(&self, store: &S, spec: &QuerySpec) -> QueryResult<Vec<serde_json::Value>>
    where
        S: EntityStore + ?Sized,
    {
        let plan = self.compile(spec)?;
        let mut rows = store.fetch_rows(&plan.build_find()).await?;
        for row in &mut rows {
            plan.target().normalize_row(row);
        }
        tracing::debug!(
            entity = spec.target_type(),
            rows = rows.len(),
            skipped_filters = plan.predicates().skipped().len(),
            "find executed"
        );
        Ok(rows)
    }

    /// Matching rows decoded into `T`.
    pub async fn find_as<T, S>(&self, store: &S, spec: &QuerySpec) -> QueryResult<Vec<T>>
    where
        T: DeserializeOwned,
        S: EntityStore + ?Sized,
    {
        self.find(store, spec)
            .await?
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(QueryError::from))
            .collect()
    }

    /// Number of matching rows; sort and pagination are ignored.
    pub async fn count<S>(&self, store: &S, spec: &QuerySpec) -> QueryResult<u64>
    where
        S: EntityStore + ?Sized,
    {
        let plan = self.compile(spec)?;
        let total = store.fetch_count(&plan.build_count()).await?;
        tracing::debug!(entity = spec.target_type(), total, "count executed");
        Ok(u64::try_from(total).unwrap_or(0))
    }

    /// Whether any row matches, probing at most one row.
    ///
    /// A NULL projected value still counts as a match.
    pub async fn exists<S>(&self, store: &S, spec: &QuerySpec) -> QueryResult<bool>
    where
        S: EntityStore + ?Sized,
    {
        let plan = self.compile(spec)?;
        let found = store.fetch_exists(&plan.build_exists()).await?;
        tracing::debug!(entity = spec.target_type(), found, "exists executed");
        Ok(found)
    }

    /// Projected values of matching rows, sorted and paginated.
    pub async fn pluck<S>(&self, store: &S, spec: &QuerySpec) -> QueryResult<Vec<serde_json::Value>>
    where
        S: EntityStore + ?Sized,
    {
        let plan = self.compile(spec)?;
        let rows = store.fetch_rows(&plan.build_pluck()?).await?;
        Ok(rows
            .into_iter()
            .map(|mut row| {
                row.get_mut(VALUE_COLUMN)
                    .map(serde_json::Value::take)
                    .unwrap_or(serde_json::Value::Null)
            })
            .collect())
    }

    /// One pagination window plus the total match count.
    pub async fn find_page<S>(&self, store: &S, spec: &QuerySpec) -> QueryResult<Page>
    where
        S: EntityStore + ?Sized,
    {
        let total = self.count(store, spec).await?;
        let items = self.find(store, spec).await?;
        Ok(Page::new(
            items,
            total,
            spec.offset().unwrap_or(0),
            spec.limit(),
        ))
    }
}
