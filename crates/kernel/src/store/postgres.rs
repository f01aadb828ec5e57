//! PostgreSQL entity store.

use std::time::Duration;

use async_trait::async_trait;
use sea_query::{PostgresQueryBuilder, SelectStatement};
use sqlx::PgPool;

use super::EntityStore;

/// Store backed by a PostgreSQL pool.
///
/// When a statement timeout is configured, each call runs in a transaction
/// with `SET LOCAL statement_timeout`, which resets on commit/rollback.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    statement_timeout: Option<Duration>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            statement_timeout: None,
        }
    }

    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = Some(timeout);
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn begin(&self) -> Result<sqlx::Transaction<'static, sqlx::Postgres>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        if let Some(timeout) = self.statement_timeout {
            sqlx::query(&statement_timeout_sql(timeout))
                .execute(&mut *tx)
                .await?;
        }
        Ok(tx)
    }
}

#[async_trait]
impl EntityStore for PgStore {
    async fn fetch_rows(
        &self,
        query: &SelectStatement,
    ) -> Result<Vec<serde_json::Value>, sqlx::Error> {
        let sql = query.to_string(PostgresQueryBuilder);
        tracing::debug!(sql = %sql, "fetching rows");

        let mut tx = self.begin().await?;
        let rows: Vec<serde_json::Value> = sqlx::query_scalar(&row_json_sql(&sql))
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(rows)
    }

    async fn fetch_count(&self, query: &SelectStatement) -> Result<i64, sqlx::Error> {
        let sql = query.to_string(PostgresQueryBuilder);
        tracing::debug!(sql = %sql, "fetching count");

        let mut tx = self.begin().await?;
        let total: i64 = sqlx::query_scalar(&sql).fetch_one(&mut *tx).await?;
        tx.commit().await?;
        Ok(total)
    }

    async fn fetch_exists(&self, query: &SelectStatement) -> Result<bool, sqlx::Error> {
        let sql = query.to_string(PostgresQueryBuilder);
        tracing::debug!(sql = %sql, "probing existence");

        let mut tx = self.begin().await?;
        let row = sqlx::query(&sql).fetch_optional(&mut *tx).await?;
        tx.commit().await?;
        Ok(row.is_some())
    }
}

/// `SET LOCAL` statement applying `timeout` to the current transaction.
fn statement_timeout_sql(timeout: Duration) -> String {
    format!("SET LOCAL statement_timeout = '{}ms'", timeout.as_millis())
}

/// Wrap a SELECT so each row comes back as one JSON object.
fn row_json_sql(sql: &str) -> String {
    format!("SELECT row_to_json(t) FROM ({sql}) t")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::forum_registry;
    use crate::query::{Filter, PathResolver, QueryPlan, QuerySpec};
    use std::sync::Arc;

    #[test]
    fn timeout_statement_uses_milliseconds() {
        assert_eq!(
            statement_timeout_sql(Duration::from_secs(10)),
            "SET LOCAL statement_timeout = '10000ms'"
        );
        assert_eq!(
            statement_timeout_sql(Duration::from_millis(250)),
            "SET LOCAL statement_timeout = '250ms'"
        );
    }

    #[test]
    fn rows_are_wrapped_as_json_objects() {
        let resolver = PathResolver::new(Arc::new(forum_registry()));
        let spec = QuerySpec::builder("user")
            .filter(Filter::eq("name", "Alice"))
            .build();
        let plan = QueryPlan::prepare(&spec, &resolver).unwrap();
        let inner = plan.build_find().to_string(PostgresQueryBuilder);

        let sql = row_json_sql(&inner);
        assert!(sql.starts_with("SELECT row_to_json(t) FROM (SELECT "), "{sql}");
        assert!(sql.ends_with(") t"), "{sql}");
        assert!(sql.contains("WHERE \"users\".\"name\" = 'Alice'"), "{sql}");
    }
}
