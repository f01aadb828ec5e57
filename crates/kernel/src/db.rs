//! Store connection management.

use anyhow::{Context, Result, bail};
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

use crate::config::Config;
use crate::store::{EntityStore, PgStore, SqliteStore};

/// Connect to the store named by `DATABASE_URL`.
pub async fn connect_store(config: &Config) -> Result<Box<dyn EntityStore>> {
    let url = config.database_url.as_str();
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(url)
            .await
            .context("failed to connect to PostgreSQL")?;
        let mut store = PgStore::new(pool);
        if let Some(timeout) = config.statement_timeout {
            store = store.with_statement_timeout(timeout);
        }
        Ok(Box::new(store))
    } else if url.starts_with("sqlite:") {
        let mut options =
            SqliteConnectOptions::from_str(url).context("invalid SQLite connection URL")?;
        if let Some(timeout) = config.statement_timeout {
            options = options.busy_timeout(timeout);
        }
        let pool = SqlitePoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect_with(options)
            .await
            .context("failed to open SQLite database")?;
        Ok(Box::new(SqliteStore::new(pool)))
    } else {
        bail!("unsupported DATABASE_URL scheme: {url}");
    }
}
