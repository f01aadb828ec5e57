//! Dynamic query engine module.
//!
//! This module provides:
//! - QuerySpec / QuerySpecBuilder: declarative query specification
//! - EntityRegistry: entity schema and relation metadata
//! - PathResolver: dotted field path navigation
//! - PredicateCompiler: filter type-checking and SeaQuery condition generation
//! - QueryPlan: find/count/exists statement generation
//! - QueryEngine: execution against a caller-supplied entity store

mod builder;
mod error;
mod executor;
mod path;
mod plan;
mod predicate;
mod schema;
pub mod types;

pub use builder::QuerySpecBuilder;
pub use error::{QueryError, QueryResult};
pub use executor::QueryEngine;
pub use path::{DEFAULT_PATH_CACHE_CAPACITY, JoinStep, PathError, PathResolver, ResolvedPath};
pub use plan::QueryPlan;
pub use predicate::{CompiledPredicates, InvalidFilter, PredicateCompiler, SkippedFilter};
pub use schema::{EntityDef, EntityRegistry, FieldDef, FieldKind, RelationDef};
pub use types::{Filter, FilterValue, Operator, Page, QuerySpec, SortDirection, UnparsedFilter};
