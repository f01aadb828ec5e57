//! Filter compilation into SeaQuery conditions.
//!
//! Every filter becomes one predicate; predicates are AND-ed. A filter whose
//! path cannot be resolved or whose value breaks its operator's contract is
//! dropped and reported as a [`SkippedFilter`] instead of failing the query.

use std::sync::Arc;

use sea_query::{Alias, Cond, Condition, Expr, LikeExpr, SimpleExpr, Value};
use thiserror::Error;

use super::path::{JoinStep, PathError, PathResolver, ResolvedPath};
use super::schema::FieldKind;
use super::types::{Filter, FilterValue, Operator, UnparsedFilter};

/// Reasons a filter is dropped.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InvalidFilter {
    #[error("unresolvable path: {0}")]
    Path(#[from] PathError),

    #[error("{operator} requires an upper bound")]
    MissingUpperBound { operator: Operator },

    #[error("{operator} does not take an upper bound")]
    UnexpectedUpperBound { operator: Operator },

    #[error("{operator} requires a single value, got a list")]
    NotScalar { operator: Operator },

    #[error("{kind} value is not comparable")]
    NotComparable { kind: &'static str },

    #[error("field of kind {kind:?} has no ordering")]
    UnorderedField { kind: FieldKind },

    #[error("{found} value cannot be used with a {expected:?} field")]
    IncompatibleValue {
        expected: FieldKind,
        found: &'static str,
    },

    #[error("range bounds have different kinds ({from} and {to})")]
    MismatchedBounds {
        from: &'static str,
        to: &'static str,
    },

    #[error("IN requires a collection, got {found}")]
    NotACollection { found: &'static str },

    #[error("ISNULL requires a boolean, got {found}")]
    NotBoolean { found: &'static str },

    #[error("unknown operator '{name}'")]
    UnknownOperator { name: String },

    #[error("{operator} requires a value")]
    MissingValue { operator: Operator },

    #[error("{operator} value must be a scalar or a list of scalars")]
    UnsupportedValue { operator: Operator },
}

/// A filter left out of the compiled condition.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedFilter {
    pub field_path: String,
    /// Operator wire name, kept as text since unknown names are skipped too.
    pub operator: String,
    pub reason: InvalidFilter,
}

/// AND-combined predicates plus the joins they depend on.
#[derive(Debug, Clone)]
pub struct CompiledPredicates {
    condition: Condition,
    predicate_count: usize,
    joins: Vec<JoinStep>,
    skipped: Vec<SkippedFilter>,
}

impl CompiledPredicates {
    /// The combined condition; match-all when no predicate was compiled.
    pub fn condition(&self) -> Condition {
        self.condition.clone()
    }

    pub fn is_match_all(&self) -> bool {
        self.predicate_count == 0
    }

    pub fn predicate_count(&self) -> usize {
        self.predicate_count
    }

    pub fn joins(&self) -> &[JoinStep] {
        &self.joins
    }

    pub fn skipped(&self) -> &[SkippedFilter] {
        &self.skipped
    }
}

/// Compiles filters against one root entity.
pub struct PredicateCompiler<'a> {
    resolver: &'a PathResolver,
    entity: &'a str,
}

impl<'a> PredicateCompiler<'a> {
    pub fn new(resolver: &'a PathResolver, entity: &'a str) -> Self {
        Self { resolver, entity }
    }

    /// Compile all filters, logging each one that is skipped.
    pub fn compile(&self, filters: &[Filter]) -> CompiledPredicates {
        self.compile_with_unparsed(filters, &[])
    }

    /// Compile filters and report document entries that never parsed.
    pub fn compile_with_unparsed(
        &self,
        filters: &[Filter],
        unparsed: &[UnparsedFilter],
    ) -> CompiledPredicates {
        let mut condition = Cond::all();
        let mut predicate_count = 0;
        let mut joins: Vec<JoinStep> = Vec::new();
        let mut skipped = Vec::new();

        for filter in filters {
            match self.compile_filter(filter) {
                Ok((expr, path)) => {
                    condition = condition.add(expr);
                    predicate_count += 1;
                    merge_joins(&mut joins, &path.joins);
                }
                Err(reason) => skipped.push(self.skip(
                    &filter.field_path,
                    filter.operator.to_string(),
                    reason,
                )),
            }
        }
        for entry in unparsed {
            skipped.push(self.skip(
                &entry.field_path,
                entry.operator.clone(),
                entry.reason.clone(),
            ));
        }

        CompiledPredicates {
            condition,
            predicate_count,
            joins,
            skipped,
        }
    }

    fn skip(&self, field_path: &str, operator: String, reason: InvalidFilter) -> SkippedFilter {
        tracing::warn!(
            entity = self.entity,
            field_path,
            operator = %operator,
            reason = %reason,
            "skipping invalid filter"
        );
        SkippedFilter {
            field_path: field_path.to_string(),
            operator,
            reason,
        }
    }

    /// Build a single predicate.
    pub fn compile_filter(
        &self,
        filter: &Filter,
    ) -> Result<(SimpleExpr, Arc<ResolvedPath>), InvalidFilter> {
        let operator = filter.operator;
        match (operator.is_range(), &filter.value_to) {
            (true, None) => return Err(InvalidFilter::MissingUpperBound { operator }),
            (false, Some(_)) => return Err(InvalidFilter::UnexpectedUpperBound { operator }),
            _ => {}
        }
        if filter.value == FilterValue::Null {
            return Err(InvalidFilter::MissingValue { operator });
        }

        let path = self.resolver.resolve(self.entity, &filter.field_path)?;
        let column = path.expr();
        let value = &filter.value;

        let expr = match operator {
            Operator::Eq => column.eq(coerce_scalar(value, path.kind, operator)?),
            Operator::Ne => column.ne(coerce_scalar(value, path.kind, operator)?),
            Operator::Gt => column.gt(coerce_ordered(value, path.kind)?),
            Operator::Gte => column.gte(coerce_ordered(value, path.kind)?),
            Operator::Lt => column.lt(coerce_ordered(value, path.kind)?),
            Operator::Lte => column.lte(coerce_ordered(value, path.kind)?),
            Operator::Between => {
                let Some(upper) = &filter.value_to else {
                    return Err(InvalidFilter::MissingUpperBound { operator });
                };
                let from = coerce_ordered(value, path.kind)?;
                let to = coerce_ordered(upper, path.kind)?;
                if value.comparable_class() != upper.comparable_class() {
                    return Err(InvalidFilter::MismatchedBounds {
                        from: value.kind_name(),
                        to: upper.kind_name(),
                    });
                }
                column.between(from, to)
            }
            Operator::Like => {
                let text = value
                    .as_string()
                    .ok_or(InvalidFilter::NotScalar { operator })?;
                let pattern =
                    LikeExpr::new(format!("%{}%", escape_like_wildcards(&text))).escape('\\');
                if path.kind == FieldKind::Text {
                    column.like(pattern)
                } else {
                    Expr::expr(column.cast_as(Alias::new("TEXT"))).like(pattern)
                }
            }
            Operator::In => {
                let FilterValue::List(items) = value else {
                    return Err(InvalidFilter::NotACollection {
                        found: value.kind_name(),
                    });
                };
                let values = items
                    .iter()
                    .map(|item| coerce_scalar(item, path.kind, operator))
                    .collect::<Result<Vec<Value>, _>>()?;
                column.is_in(values)
            }
            Operator::IsNull => match value {
                FilterValue::Boolean(true) => column.is_null(),
                FilterValue::Boolean(false) => column.is_not_null(),
                other => {
                    return Err(InvalidFilter::NotBoolean {
                        found: other.kind_name(),
                    });
                }
            },
        };

        Ok((expr, path))
    }
}

/// Append joins not already present, keeping first-seen order.
pub(crate) fn merge_joins(into: &mut Vec<JoinStep>, joins: &[JoinStep]) {
    for join in joins {
        if !into.iter().any(|j| j.alias == join.alias) {
            into.push(join.clone());
        }
    }
}

/// Coerce a scalar to the storage kind of a field.
fn coerce_scalar(
    value: &FilterValue,
    kind: FieldKind,
    operator: Operator,
) -> Result<Value, InvalidFilter> {
    if value.is_list() {
        return Err(InvalidFilter::NotScalar { operator });
    }
    let incompatible = || InvalidFilter::IncompatibleValue {
        expected: kind,
        found: value.kind_name(),
    };
    let coerced = match kind {
        // Fractional values stay doubles; SQL compares them numerically.
        FieldKind::Integer | FieldKind::Timestamp => value
            .as_i64()
            .map(Value::from)
            .or_else(|| value.as_f64().map(Value::from)),
        FieldKind::Float => value.as_f64().map(Value::from),
        FieldKind::Text => value.as_string().map(Value::from),
        FieldKind::Boolean => value.as_bool().map(Value::from),
        FieldKind::Uuid => value.as_uuid().map(Value::from),
    };
    coerced.ok_or_else(incompatible)
}

/// Coerce a value for an ordering comparison.
fn coerce_ordered(value: &FilterValue, kind: FieldKind) -> Result<Value, InvalidFilter> {
    if value.comparable_class().is_none() {
        return Err(InvalidFilter::NotComparable {
            kind: value.kind_name(),
        });
    }
    if !kind.is_ordered() {
        return Err(InvalidFilter::UnorderedField { kind });
    }
    coerce_scalar(value, kind, Operator::Gt)
}

/// Escape SQL LIKE wildcard characters (`%`, `_`, `\`) in a value.
fn escape_like_wildcards(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
