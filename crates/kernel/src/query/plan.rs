//! SeaQuery statement generation for a compiled [`QuerySpec`].
//!
//! A [`QueryPlan`] holds everything resolved for one call (target entity,
//! compiled predicates, sort and projection paths) and emits the find, count,
//! exists and pluck statements from it, so all variants share one FROM/WHERE.

use std::sync::Arc;

use sea_query::{Alias, Asterisk, Expr, JoinType, Order, Query, SelectStatement};

use super::error::{QueryError, QueryResult};
use super::path::{JoinStep, PathResolver, ResolvedPath};
use super::predicate::{CompiledPredicates, PredicateCompiler, merge_joins};
use super::schema::EntityDef;
use super::types::QuerySpec;

/// Column alias used for single-value selections.
pub const VALUE_COLUMN: &str = "value";

/// Root rows link to target rows through this foreign key.
#[derive(Debug, Clone)]
struct SemiJoin {
    root_table: String,
    link_column: String,
}

/// Resolved, per-call form of a query specification.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    target: EntityDef,
    predicates: CompiledPredicates,
    semi_join: Option<SemiJoin>,
    sort: Option<(Arc<ResolvedPath>, Order)>,
    projection: Option<Arc<ResolvedPath>>,
    offset: Option<u64>,
    limit: Option<u64>,
}

impl QueryPlan {
    /// Resolve a spec against the schema.
    ///
    /// Invalid filters are dropped; unknown entities and unresolvable sort or
    /// projection paths fail the call.
    pub fn prepare(spec: &QuerySpec, resolver: &PathResolver) -> QueryResult<Self> {
        let registry = resolver.registry();
        let target = registry
            .get(spec.target_type())
            .ok_or_else(|| QueryError::UnknownEntity(spec.target_type().to_string()))?;
        let root = registry
            .get(spec.root_type())
            .ok_or_else(|| QueryError::UnknownEntity(spec.root_type().to_string()))?;

        let semi_join = if spec.is_rooted_elsewhere() {
            let link = root
                .relation_to(&target.name)
                .ok_or_else(|| QueryError::UnrelatedRoot {
                    root: root.name.clone(),
                    target: target.name.clone(),
                })?;
            Some(SemiJoin {
                root_table: root.table.clone(),
                link_column: link.local_column.clone(),
            })
        } else {
            None
        };

        let predicates = PredicateCompiler::new(resolver, &root.name)
            .compile_with_unparsed(spec.filters(), spec.unparsed_filters());

        let sort = spec
            .sort_field()
            .map(|path| {
                resolver
                    .resolve(&target.name, path)
                    .map_err(|source| QueryError::SortPath {
                        path: path.to_string(),
                        source,
                    })
            })
            .transpose()?
            .map(|path| {
                let order = if spec.sort_descending() {
                    Order::Desc
                } else {
                    Order::Asc
                };
                (path, order)
            });

        let projection = spec
            .projection_path()
            .map(|path| {
                resolver
                    .resolve(&target.name, path)
                    .map_err(|source| QueryError::ProjectionPath {
                        path: path.to_string(),
                        source,
                    })
            })
            .transpose()?;

        Ok(Self {
            target: target.clone(),
            predicates,
            semi_join,
            sort,
            projection,
            offset: spec.offset(),
            limit: spec.limit(),
        })
    }

    pub fn target(&self) -> &EntityDef {
        &self.target
    }

    pub fn predicates(&self) -> &CompiledPredicates {
        &self.predicates
    }

    pub fn projection(&self) -> Option<&ResolvedPath> {
        self.projection.as_deref()
    }

    /// Build the find query: target columns, sorted and paginated.
    pub fn build_find(&self) -> SelectStatement {
        let mut query = self.base_query(self.outer_joins(true, false));

        for field in self.target.fields() {
            query.expr_as(
                Expr::col((Alias::new(&self.target.table), Alias::new(&field.column))),
                Alias::new(&field.name),
            );
        }

        self.add_sort(&mut query);
        self.add_window(&mut query);
        query
    }

    /// Build a COUNT query; sort and pagination are ignored.
    pub fn build_count(&self) -> SelectStatement {
        let mut query = self.base_query(self.outer_joins(false, false));
        query.expr(Expr::col(Asterisk).count());
        query
    }

    /// Build a bounded existence check (`LIMIT 1`).
    pub fn build_exists(&self) -> SelectStatement {
        let mut query = self.base_query(self.outer_joins(false, true));
        match &self.projection {
            Some(path) => query.expr_as(path.expr(), Alias::new(VALUE_COLUMN)),
            None => query.expr_as(Expr::val(1), Alias::new(VALUE_COLUMN)),
        };
        query.limit(1);
        query
    }

    /// Build a projected-value query honoring sort and pagination.
    pub fn build_pluck(&self) -> QueryResult<SelectStatement> {
        let path = self
            .projection
            .as_ref()
            .ok_or(QueryError::MissingProjection)?;
        let mut query = self.base_query(self.outer_joins(true, true));
        query.expr_as(path.expr(), Alias::new(VALUE_COLUMN));
        self.add_sort(&mut query);
        self.add_window(&mut query);
        Ok(query)
    }

    /// FROM, joins and WHERE shared by every variant.
    fn base_query(&self, joins: Vec<JoinStep>) -> SelectStatement {
        let mut query = Query::select();
        query.from(Alias::new(&self.target.table));
        add_joins(&mut query, &joins);

        match &self.semi_join {
            Some(semi) => {
                let mut inner = Query::select();
                inner
                    .column((Alias::new(&semi.root_table), Alias::new(&semi.link_column)))
                    .from(Alias::new(&semi.root_table));
                add_joins(&mut inner, self.predicates.joins());
                if !self.predicates.is_match_all() {
                    inner.cond_where(self.predicates.condition());
                }
                query.and_where(
                    Expr::col((
                        Alias::new(&self.target.table),
                        Alias::new(self.target.primary_key_column()),
                    ))
                    .in_subquery(inner),
                );
            }
            None => {
                if !self.predicates.is_match_all() {
                    query.cond_where(self.predicates.condition());
                }
            }
        }

        query
    }

    /// Joins on the outer query: filter joins (unless they live in the
    /// semi-join subquery) followed by sort/projection joins.
    fn outer_joins(&self, with_sort: bool, with_projection: bool) -> Vec<JoinStep> {
        let mut joins = Vec::new();
        if self.semi_join.is_none() {
            merge_joins(&mut joins, self.predicates.joins());
        }
        if with_sort && let Some((path, _)) = &self.sort {
            merge_joins(&mut joins, &path.joins);
        }
        if with_projection && let Some(path) = &self.projection {
            merge_joins(&mut joins, &path.joins);
        }
        joins
    }

    /// Add ORDER BY, with the primary key as tie-breaker for stable paging.
    fn add_sort(&self, query: &mut SelectStatement) {
        let Some((path, order)) = &self.sort else {
            return;
        };
        query.order_by_expr(path.expr().into(), order.clone());

        let pk = self.target.primary_key_column();
        let sorts_by_pk = path.joins.is_empty() && path.column == pk;
        if !sorts_by_pk {
            query.order_by(
                (Alias::new(&self.target.table), Alias::new(pk)),
                Order::Asc,
            );
        }
    }

    /// Add LIMIT/OFFSET. An offset without a limit still needs a LIMIT for
    /// SQLite, so the largest signed value stands in for "unbounded".
    fn add_window(&self, query: &mut SelectStatement) {
        match (self.offset, self.limit) {
            (_, Some(limit)) => {
                query.limit(clamp_window(limit));
            }
            (Some(_), None) => {
                query.limit(MAX_WINDOW);
            }
            (None, None) => {}
        }
        if let Some(offset) = self.offset {
            query.offset(clamp_window(offset));
        }
    }
}

/// Largest LIMIT/OFFSET both backends accept (signed 64-bit).
const MAX_WINDOW: u64 = i64::MAX as u64;

fn clamp_window(value: u64) -> u64 {
    value.min(MAX_WINDOW)
}

/// Add LEFT JOIN clauses in dependency order.
fn add_joins(query: &mut SelectStatement, joins: &[JoinStep]) {
    for join in joins {
        let parent = (Alias::new(&join.parent_alias), Alias::new(&join.local_column));
        let joined = (Alias::new(&join.alias), Alias::new(&join.foreign_column));
        let on_condition = Expr::col(parent).equals(joined);
        query.join_as(
            JoinType::LeftJoin,
            Alias::new(&join.table),
            Alias::new(&join.alias),
            on_condition,
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::query::schema::{EntityRegistry, FieldKind};
    use crate::query::types::Filter;
    use sea_query::{PostgresQueryBuilder, SqliteQueryBuilder};

    fn resolver() -> PathResolver {
        PathResolver::new(Arc::new(
            EntityRegistry::new()
                .with(
                    EntityDef::new("user", "users")
                        .field("id", FieldKind::Integer)
                        .field("name", FieldKind::Text)
                        .nullable_field("age", FieldKind::Integer),
                )
                .with(
                    EntityDef::new("post", "posts")
                        .field("id", FieldKind::Integer)
                        .field("body", FieldKind::Text)
                        .field("author_id", FieldKind::Integer)
                        .relation("author", "user", "author_id"),
                ),
        ))
    }

    fn plan(spec: &QuerySpec) -> QueryPlan {
        QueryPlan::prepare(spec, &resolver()).unwrap()
    }

    #[test]
    fn simple_find_build() {
        let spec = QuerySpec::builder("user")
            .filter(Filter::eq("name", "Alice"))
            .sort_field("age")
            .sort_descending(true)
            .limit(10)
            .build();
        let sql = plan(&spec).build_find().to_string(PostgresQueryBuilder);

        assert!(sql.contains("FROM \"users\""), "{sql}");
        assert!(sql.contains("\"users\".\"name\" AS \"name\""), "{sql}");
        assert!(sql.contains("WHERE \"users\".\"name\" = 'Alice'"), "{sql}");
        assert!(
            sql.contains("ORDER BY \"users\".\"age\" DESC, \"users\".\"id\" ASC"),
            "{sql}"
        );
        assert!(sql.contains("LIMIT 10"), "{sql}");
        assert!(!sql.contains("OFFSET"), "{sql}");
    }

    #[test]
    fn find_without_filters_has_no_where() {
        let spec = QuerySpec::builder("user").build();
        let sql = plan(&spec).build_find().to_string(SqliteQueryBuilder);

        assert!(!sql.contains("WHERE"), "{sql}");
        assert!(!sql.contains("ORDER BY"), "{sql}");
        assert!(!sql.contains("LIMIT"), "{sql}");
    }

    #[test]
    fn offset_without_limit_is_unbounded() {
        let spec = QuerySpec::builder("user").offset(2).build();
        let sql = plan(&spec).build_find().to_string(SqliteQueryBuilder);

        assert!(sql.contains(&format!("LIMIT {}", i64::MAX)), "{sql}");
        assert!(sql.contains("OFFSET 2"), "{sql}");
    }

    #[test]
    fn count_query_build() {
        let spec = QuerySpec::builder("user")
            .filter(Filter::gt("age", 20))
            .sort_field("name")
            .offset(5)
            .limit(5)
            .build();
        let sql = plan(&spec).build_count().to_string(PostgresQueryBuilder);

        assert!(sql.contains("COUNT(*)"), "{sql}");
        assert!(sql.contains("\"age\" > 20"), "{sql}");
        assert!(!sql.contains("ORDER BY"), "{sql}");
        assert!(!sql.contains("LIMIT"), "{sql}");
        assert!(!sql.contains("OFFSET"), "{sql}");
    }

    #[test]
    fn exists_is_bounded() {
        let spec = QuerySpec::builder("user")
            .filter(Filter::eq("name", "Bob"))
            .sort_field("age")
            .limit(50)
            .build();
        let sql = plan(&spec).build_exists().to_string(PostgresQueryBuilder);

        assert!(sql.contains("LIMIT 1"), "{sql}");
        assert!(!sql.contains("LIMIT 50"), "{sql}");
        assert!(!sql.contains("ORDER BY"), "{sql}");
        assert!(!sql.contains("COUNT"), "{sql}");
    }

    #[test]
    fn exists_selects_projection() {
        let spec = QuerySpec::builder("post")
            .target_path("author.name")
            .build();
        let sql = plan(&spec).build_exists().to_string(PostgresQueryBuilder);

        assert!(
            sql.contains("\"posts__author\".\"name\" AS \"value\""),
            "{sql}"
        );
        assert!(sql.contains("LEFT JOIN \"users\" AS \"posts__author\""), "{sql}");
        assert!(sql.contains("LIMIT 1"), "{sql}");
    }

    #[test]
    fn nested_filter_joins_once() {
        let spec = QuerySpec::builder("post")
            .filter(Filter::eq("author.name", "Alice"))
            .filter(Filter::gt("author.age", 20))
            .sort_field("author.name")
            .build();
        let sql = plan(&spec).build_find().to_string(PostgresQueryBuilder);

        assert_eq!(sql.matches("LEFT JOIN").count(), 1, "{sql}");
        assert!(
            sql.contains("ON \"posts\".\"author_id\" = \"posts__author\".\"id\""),
            "{sql}"
        );
    }

    #[test]
    fn oversized_window_is_clamped() {
        let spec = QuerySpec::builder("user")
            .offset(u64::MAX)
            .limit(u64::MAX)
            .build();
        let sql = plan(&spec).build_find().to_string(PostgresQueryBuilder);

        assert!(sql.contains("LIMIT 9223372036854775807"), "{sql}");
        assert!(sql.contains("OFFSET 9223372036854775807"), "{sql}");
    }

    #[test]
    fn unparsed_document_filters_are_reported() {
        let spec: QuerySpec = serde_json::from_str(
            r#"{"target_type": "user", "filters": [
                {"field_path": "name", "operator": "EQ", "value": "Alice"},
                {"field_path": "name", "operator": "REGEX", "value": "^A"}
            ]}"#,
        )
        .unwrap();
        let plan = plan(&spec);

        assert_eq!(plan.predicates().predicate_count(), 1);
        assert_eq!(plan.predicates().skipped().len(), 1);
        assert_eq!(plan.predicates().skipped()[0].operator, "REGEX");
    }

    #[test]
    fn semi_join_when_rooted_elsewhere() {
        let spec = QuerySpec::builder("user")
            .root_entity_type("post")
            .filter(Filter::like("body", "rust"))
            .sort_field("name")
            .build();
        let sql = plan(&spec).build_find().to_string(PostgresQueryBuilder);

        assert!(sql.contains("FROM \"users\""), "{sql}");
        assert!(
            sql.contains("\"users\".\"id\" IN (SELECT \"posts\".\"author_id\" FROM \"posts\""),
            "{sql}"
        );
        assert!(sql.contains("\"posts\".\"body\" LIKE"), "{sql}");
        assert!(sql.contains("ORDER BY \"users\".\"name\" ASC"), "{sql}");
    }

    #[test]
    fn unrelated_root_is_an_error() {
        let spec = QuerySpec::builder("post").root_entity_type("user").build();
        let err = QueryPlan::prepare(&spec, &resolver()).unwrap_err();
        assert!(matches!(err, QueryError::UnrelatedRoot { .. }), "{err}");
    }

    #[test]
    fn bad_sort_or_projection_is_an_error() {
        let resolver = resolver();

        let spec = QuerySpec::builder("user").sort_field("nickname").build();
        let err = QueryPlan::prepare(&spec, &resolver).unwrap_err();
        assert!(matches!(err, QueryError::SortPath { .. }), "{err}");

        let spec = QuerySpec::builder("user").target_path("name.first").build();
        let err = QueryPlan::prepare(&spec, &resolver).unwrap_err();
        assert!(matches!(err, QueryError::ProjectionPath { .. }), "{err}");

        let spec = QuerySpec::builder("forum").build();
        let err = QueryPlan::prepare(&spec, &resolver).unwrap_err();
        assert!(matches!(err, QueryError::UnknownEntity(ref name) if name == "forum"));
    }

    #[test]
    fn bad_filter_path_is_not_an_error() {
        let spec = QuerySpec::builder("user")
            .filter(Filter::eq("nickname", "x"))
            .build();
        let plan = plan(&spec);

        assert_eq!(plan.predicates().skipped().len(), 1);
        let sql = plan.build_count().to_string(PostgresQueryBuilder);
        assert!(!sql.contains("WHERE"), "{sql}");
    }

    #[test]
    fn pluck_requires_projection() {
        let spec = QuerySpec::builder("user").build();
        assert!(matches!(
            plan(&spec).build_pluck(),
            Err(QueryError::MissingProjection)
        ));

        let spec = QuerySpec::builder("user")
            .target_path("name")
            .sort_field("name")
            .limit(3)
            .build();
        let sql = plan(&spec).build_pluck().unwrap().to_string(PostgresQueryBuilder);
        assert!(sql.contains("\"users\".\"name\" AS \"value\""), "{sql}");
        assert!(sql.contains("LIMIT 3"), "{sql}");
    }
}
