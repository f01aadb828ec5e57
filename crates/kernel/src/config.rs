//! Configuration loaded from environment variables.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::query::DEFAULT_PATH_CACHE_CAPACITY;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Store connection URL (`postgres://...` or `sqlite:...`).
    pub database_url: String,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// Per-statement timeout passed through to the store. Unset means the
    /// store's own default applies.
    pub statement_timeout: Option<Duration>,

    /// Maximum number of memoized field path resolutions (default: 1024).
    pub path_cache_capacity: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let database_url =
            env::var("DATABASE_URL").context("DATABASE_URL environment variable is required")?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let statement_timeout = env::var("QUERY_STATEMENT_TIMEOUT_MS")
            .ok()
            .map(|v| v.parse::<u64>())
            .transpose()
            .context("QUERY_STATEMENT_TIMEOUT_MS must be a number of milliseconds")?
            .map(Duration::from_millis);

        let path_cache_capacity = env::var("PATH_CACHE_CAPACITY")
            .map(|v| v.parse())
            .unwrap_or(Ok(DEFAULT_PATH_CACHE_CAPACITY))
            .context("PATH_CACHE_CAPACITY must be a valid u64")?;

        Ok(Self {
            database_url,
            database_max_connections,
            statement_timeout,
            path_cache_capacity,
        })
    }
}
