//! Query engine error types.

use thiserror::Error;

use super::path::PathError;

/// Errors that fail a whole query call.
///
/// Invalid filters never surface here; they are skipped and logged.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("unknown entity type '{0}'")]
    UnknownEntity(String),

    #[error("root entity '{root}' has no relation to target entity '{target}'")]
    UnrelatedRoot { root: String, target: String },

    #[error("invalid sort field '{path}': {source}")]
    SortPath {
        path: String,
        #[source]
        source: PathError,
    },

    #[error("invalid projection path '{path}': {source}")]
    ProjectionPath {
        path: String,
        #[source]
        source: PathError,
    },

    #[error("query has no projection path")]
    MissingProjection,

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("failed to decode row: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Result type alias using QueryError.
pub type QueryResult<T> = Result<T, QueryError>;
