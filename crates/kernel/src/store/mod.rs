//! Entity store capability consumed by the query engine.
//!
//! The engine never owns a connection: callers hand a store to each query
//! call. Stores render SeaQuery statements in their own dialect and return
//! rows as JSON objects keyed by the selected column aliases.

mod postgres;
mod sqlite;

use async_trait::async_trait;
use sea_query::SelectStatement;

pub use postgres::PgStore;
pub use sqlite::SqliteStore;

/// Capability to run engine-built queries against a backing store.
///
/// Errors are returned unchanged; the engine adds no retry policy.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Run a SELECT and return every row as a JSON object.
    async fn fetch_rows(
        &self,
        query: &SelectStatement,
    ) -> Result<Vec<serde_json::Value>, sqlx::Error>;

    /// Run a single-column aggregate count.
    async fn fetch_count(&self, query: &SelectStatement) -> Result<i64, sqlx::Error>;

    /// Whether the query produces at least one row.
    async fn fetch_exists(&self, query: &SelectStatement) -> Result<bool, sqlx::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn statements_cross_await_points() {
        // Store futures borrow the statement across `.await`.
        assert_send_sync::<SelectStatement>();
        assert_send_sync::<PgStore>();
        assert_send_sync::<SqliteStore>();
        assert_send_sync::<Box<dyn EntityStore>>();
    }
}
