//! Dotted field path resolution.
//!
//! Walks a path such as `discussion.author.name` across the to-one relations
//! declared in the [`EntityRegistry`], producing the join chain and the final
//! column reference. Resolutions are memoized per `(entity, path)`.

use std::sync::Arc;

use moka::sync::Cache;
use sea_query::{Alias, Expr};
use thiserror::Error;

use super::schema::{EntityRegistry, FieldKind};

/// Default number of memoized path resolutions.
pub const DEFAULT_PATH_CACHE_CAPACITY: u64 = 1024;

/// Path resolution failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("field path is empty")]
    Empty,

    #[error("field path '{path}' contains an empty segment")]
    EmptySegment { path: String },

    #[error("unknown entity type '{0}'")]
    UnknownEntity(String),

    #[error("'{segment}' is not a field or relation of '{entity}'")]
    UnknownSegment { entity: String, segment: String },

    #[error("'{segment}' on '{entity}' is a scalar field and cannot be navigated")]
    NotNavigable { entity: String, segment: String },
}

/// LEFT JOIN needed to reach a related entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinStep {
    /// Alias of the joined table, unique per path prefix.
    pub alias: String,
    pub table: String,
    /// Alias of the table holding the foreign key.
    pub parent_alias: String,
    pub local_column: String,
    pub foreign_column: String,
}

/// Navigable column reference produced by the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub path: String,
    pub table_alias: String,
    pub column: String,
    pub kind: FieldKind,
    /// True when the column or any relation on the way may be NULL.
    pub nullable: bool,
    pub joins: Vec<JoinStep>,
}

impl ResolvedPath {
    /// Column expression for predicates and ordering.
    pub fn expr(&self) -> Expr {
        Expr::col((Alias::new(&self.table_alias), Alias::new(&self.column)))
    }
}

type CacheKey = (String, String);

/// Resolves dotted field paths against an entity registry.
pub struct PathResolver {
    registry: Arc<EntityRegistry>,
    cache: Cache<CacheKey, Result<Arc<ResolvedPath>, PathError>>,
}

impl PathResolver {
    pub fn new(registry: Arc<EntityRegistry>) -> Self {
        Self::with_capacity(registry, DEFAULT_PATH_CACHE_CAPACITY)
    }

    pub fn with_capacity(registry: Arc<EntityRegistry>, capacity: u64) -> Self {
        Self {
            registry,
            cache: Cache::builder().max_capacity(capacity).build(),
        }
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    /// Resolve `path` starting at entity type `entity`.
    pub fn resolve(&self, entity: &str, path: &str) -> Result<Arc<ResolvedPath>, PathError> {
        let key = (entity.to_string(), path.to_string());
        if let Some(hit) = self.cache.get(&key) {
            return hit;
        }

        let resolved = self.resolve_uncached(entity, path).map(Arc::new);
        self.cache.insert(key, resolved.clone());
        resolved
    }

    fn resolve_uncached(&self, entity_name: &str, path: &str) -> Result<ResolvedPath, PathError> {
        if path.is_empty() {
            return Err(PathError::Empty);
        }
        let segments: Vec<&str> = path.split('.').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(PathError::EmptySegment {
                path: path.to_string(),
            });
        }
        let Some((last, intermediate)) = segments.split_last() else {
            return Err(PathError::Empty);
        };

        let mut entity = self
            .registry
            .get(entity_name)
            .ok_or_else(|| PathError::UnknownEntity(entity_name.to_string()))?;
        let mut alias = entity.table.clone();
        let mut joins = Vec::with_capacity(intermediate.len());

        for segment in intermediate {
            let Some(relation) = entity.get_relation(segment) else {
                return Err(if entity.get_field(segment).is_some() {
                    PathError::NotNavigable {
                        entity: entity.name.clone(),
                        segment: segment.to_string(),
                    }
                } else {
                    PathError::UnknownSegment {
                        entity: entity.name.clone(),
                        segment: segment.to_string(),
                    }
                });
            };
            let target = self
                .registry
                .get(&relation.target)
                .ok_or_else(|| PathError::UnknownEntity(relation.target.clone()))?;

            let join_alias = format!("{alias}__{segment}");
            joins.push(JoinStep {
                alias: join_alias.clone(),
                table: target.table.clone(),
                parent_alias: alias,
                local_column: relation.local_column.clone(),
                foreign_column: target.primary_key_column().to_string(),
            });
            alias = join_alias;
            entity = target;
        }

        let through_relation = !joins.is_empty();

        if let Some(field) = entity.get_field(last) {
            return Ok(ResolvedPath {
                path: path.to_string(),
                table_alias: alias,
                column: field.column.clone(),
                kind: field.kind,
                nullable: field.nullable || through_relation,
                joins,
            });
        }

        // A trailing relation compares by its foreign key.
        if let Some(relation) = entity.get_relation(last) {
            let kind = self
                .registry
                .get(&relation.target)
                .and_then(|t| t.primary_key_field())
                .map(|f| f.kind)
                .unwrap_or(FieldKind::Integer);
            let nullable = entity
                .fields()
                .iter()
                .find(|f| f.column == relation.local_column)
                .map(|f| f.nullable)
                .unwrap_or(true);
            return Ok(ResolvedPath {
                path: path.to_string(),
                table_alias: alias,
                column: relation.local_column.clone(),
                kind,
                nullable: nullable || through_relation,
                joins,
            });
        }

        Err(PathError::UnknownSegment {
            entity: entity.name.clone(),
            segment: last.to_string(),
        })
    }
}
