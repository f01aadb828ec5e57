//! Agora Forum Kernel Library
//!
//! Exposes the dynamic query engine, the forum entity schema and the store
//! implementations. The `agora-query` binary is an admin CLI over the same
//! engine.

pub mod config;
pub mod db;
pub mod models;
pub mod query;
pub mod store;

pub use config::Config;
pub use query::{Filter, QueryEngine, QueryError, QuerySpec};
pub use store::{EntityStore, PgStore, SqliteStore};
