//! SQLite entity store.

use async_trait::async_trait;
use sea_query::{SelectStatement, SqliteQueryBuilder};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};

use super::EntityStore;

/// Store backed by a SQLite pool.
///
/// SQLite has no JSON row constructor, so rows are decoded column by column
/// from the storage class of each value.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl EntityStore for SqliteStore {
    async fn fetch_rows(
        &self,
        query: &SelectStatement,
    ) -> Result<Vec<serde_json::Value>, sqlx::Error> {
        let sql = query.to_string(SqliteQueryBuilder);
        tracing::debug!(sql = %sql, "fetching rows");

        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_json).collect()
    }

    async fn fetch_count(&self, query: &SelectStatement) -> Result<i64, sqlx::Error> {
        let sql = query.to_string(SqliteQueryBuilder);
        tracing::debug!(sql = %sql, "fetching count");

        sqlx::query_scalar(&sql).fetch_one(&self.pool).await
    }

    async fn fetch_exists(&self, query: &SelectStatement) -> Result<bool, sqlx::Error> {
        let sql = query.to_string(SqliteQueryBuilder);
        tracing::debug!(sql = %sql, "probing existence");

        let row = sqlx::query(&sql).fetch_optional(&self.pool).await?;
        Ok(row.is_some())
    }
}

/// Decode a row into a JSON object keyed by column name.
fn row_to_json(row: &SqliteRow) -> Result<serde_json::Value, sqlx::Error> {
    let mut obj = serde_json::Map::with_capacity(row.len());
    for column in row.columns() {
        let index = column.ordinal();
        let raw = row.try_get_raw(index)?;
        let value = if raw.is_null() {
            serde_json::Value::Null
        } else {
            match raw.type_info().name() {
                "INTEGER" | "BOOLEAN" => serde_json::Value::from(row.try_get::<i64, _>(index)?),
                "REAL" => serde_json::Value::from(row.try_get::<f64, _>(index)?),
                "BLOB" => serde_json::Value::from(hex::encode(row.try_get::<Vec<u8>, _>(index)?)),
                _ => serde_json::Value::from(row.try_get::<String, _>(index)?),
            }
        };
        obj.insert(column.name().to_string(), value);
    }
    Ok(serde_json::Value::Object(obj))
}
