//! Query engine types.
//!
//! Provides type definitions for the declarative query engine:
//! - Filter: one condition over a dotted field path
//! - Operator: closed set of comparison operators
//! - FilterValue: scalar and collection values a filter compares against
//! - QuerySpec: immutable query specification (filters, sort, pagination)
//! - Page: paged find result

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::predicate::InvalidFilter;

/// Comparison operators for filtering.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    /// Exact match.
    Eq,
    /// Not equal.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// Inclusive range, uses `value_to` as the upper bound.
    Between,
    /// Substring match (LIKE %value%).
    Like,
    /// Value in collection.
    In,
    /// Field is NULL (`true`) or NOT NULL (`false`).
    #[serde(rename = "ISNULL", alias = "IS_NULL")]
    IsNull,
}

impl Operator {
    /// Parse a wire name; `IS_NULL` is accepted for `ISNULL`.
    pub fn from_name(name: &str) -> Option<Self> {
        let operator = match name {
            "EQ" => Operator::Eq,
            "NE" => Operator::Ne,
            "GT" => Operator::Gt,
            "GTE" => Operator::Gte,
            "LT" => Operator::Lt,
            "LTE" => Operator::Lte,
            "BETWEEN" => Operator::Between,
            "LIKE" => Operator::Like,
            "IN" => Operator::In,
            "ISNULL" | "IS_NULL" => Operator::IsNull,
            _ => return None,
        };
        Some(operator)
    }

    /// Whether this operator takes a second value.
    pub fn is_range(self) -> bool {
        matches!(self, Operator::Between)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operator::Eq => "EQ",
            Operator::Ne => "NE",
            Operator::Gt => "GT",
            Operator::Gte => "GTE",
            Operator::Lt => "LT",
            Operator::Lte => "LTE",
            Operator::Between => "BETWEEN",
            Operator::Like => "LIKE",
            Operator::In => "IN",
            Operator::IsNull => "ISNULL",
        };
        f.write_str(name)
    }
}

/// Filter value types.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FilterValue {
    /// Boolean value.
    Boolean(bool),
    /// Integer value.
    Integer(i64),
    /// Float value.
    Float(f64),
    /// String value.
    String(String),
    /// UUID value.
    Uuid(Uuid),
    /// Collection of values (for the In operator).
    List(Vec<FilterValue>),
    /// Missing value; no operator accepts it.
    #[default]
    Null,
}

/// Ordering class of a comparable value.
///
/// Range bounds must share a class; booleans and lists have none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparableClass {
    Numeric,
    Text,
    Uuid,
}

impl FilterValue {
    /// Convert to string representation.
    pub fn as_string(&self) -> Option<String> {
        match self {
            FilterValue::String(s) => Some(s.clone()),
            FilterValue::Integer(i) => Some(i.to_string()),
            FilterValue::Float(f) => Some(f.to_string()),
            FilterValue::Boolean(b) => Some(b.to_string()),
            FilterValue::Uuid(u) => Some(u.to_string()),
            FilterValue::List(_) | FilterValue::Null => None,
        }
    }

    /// Convert to integer if possible.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FilterValue::Integer(i) => Some(*i),
            FilterValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Convert to float if possible.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FilterValue::Float(f) => Some(*f),
            FilterValue::Integer(i) => Some(*i as f64),
            FilterValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Convert to UUID if possible.
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            FilterValue::Uuid(u) => Some(*u),
            FilterValue::String(s) => Uuid::parse_str(s).ok(),
            _ => None,
        }
    }

    /// Convert to boolean if possible.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FilterValue::Boolean(b) => Some(*b),
            FilterValue::String(s) => match s.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Ordering class, `None` for values that cannot be ordered.
    pub fn comparable_class(&self) -> Option<ComparableClass> {
        match self {
            FilterValue::Integer(_) | FilterValue::Float(_) => Some(ComparableClass::Numeric),
            FilterValue::String(_) => Some(ComparableClass::Text),
            FilterValue::Uuid(_) => Some(ComparableClass::Uuid),
            FilterValue::Boolean(_) | FilterValue::List(_) | FilterValue::Null => None,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, FilterValue::List(_))
    }

    /// Short name of the value's kind, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            FilterValue::Boolean(_) => "boolean",
            FilterValue::Integer(_) => "integer",
            FilterValue::Float(_) => "float",
            FilterValue::String(_) => "string",
            FilterValue::Uuid(_) => "uuid",
            FilterValue::List(_) => "list",
            FilterValue::Null => "null",
        }
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Boolean(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Integer(value)
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        FilterValue::Integer(i64::from(value))
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        FilterValue::Float(value)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::String(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::String(value)
    }
}

impl From<Uuid> for FilterValue {
    fn from(value: Uuid) -> Self {
        FilterValue::Uuid(value)
    }
}

impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
    fn from(values: Vec<T>) -> Self {
        FilterValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FilterValue>, const N: usize> From<[T; N]> for FilterValue {
    fn from(values: [T; N]) -> Self {
        FilterValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FilterValue>> From<HashSet<T>> for FilterValue {
    fn from(values: HashSet<T>) -> Self {
        FilterValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FilterValue>> From<BTreeSet<T>> for FilterValue {
    fn from(values: BTreeSet<T>) -> Self {
        FilterValue::List(values.into_iter().map(Into::into).collect())
    }
}

/// Filter condition over a dotted field path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Filter {
    /// Dotted path from the root entity, e.g. `author.name`.
    pub field_path: String,

    /// Comparison operator.
    pub operator: Operator,

    /// Value to compare against.
    #[serde(default)]
    pub value: FilterValue,

    /// Upper bound for range operators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_to: Option<FilterValue>,
}

impl Filter {
    /// Create a single-valued filter.
    pub fn new(
        field_path: impl Into<String>,
        operator: Operator,
        value: impl Into<FilterValue>,
    ) -> Self {
        Self {
            field_path: field_path.into(),
            operator,
            value: value.into(),
            value_to: None,
        }
    }

    pub fn eq(field_path: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field_path, Operator::Eq, value)
    }

    pub fn ne(field_path: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field_path, Operator::Ne, value)
    }

    pub fn gt(field_path: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field_path, Operator::Gt, value)
    }

    pub fn gte(field_path: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field_path, Operator::Gte, value)
    }

    pub fn lt(field_path: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field_path, Operator::Lt, value)
    }

    pub fn lte(field_path: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field_path, Operator::Lte, value)
    }

    /// Inclusive range filter.
    pub fn between(
        field_path: impl Into<String>,
        from: impl Into<FilterValue>,
        to: impl Into<FilterValue>,
    ) -> Self {
        Self {
            field_path: field_path.into(),
            operator: Operator::Between,
            value: from.into(),
            value_to: Some(to.into()),
        }
    }

    /// Substring filter; the value is matched literally.
    pub fn like(field_path: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field_path, Operator::Like, value)
    }

    /// Membership filter over any collection of values.
    pub fn is_in<I, V>(field_path: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FilterValue>,
    {
        Self::new(
            field_path,
            Operator::In,
            FilterValue::List(values.into_iter().map(Into::into).collect()),
        )
    }

    /// Attach an upper bound. Only range operators accept one.
    pub fn with_upper_bound(mut self, value_to: impl Into<FilterValue>) -> Self {
        self.value_to = Some(value_to.into());
        self
    }

    /// `IS NULL` when `null` is true, `IS NOT NULL` otherwise.
    pub fn is_null(field_path: impl Into<String>, null: bool) -> Self {
        Self::new(field_path, Operator::IsNull, null)
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Immutable query specification.
///
/// Built with [`QuerySpec::builder`]; deserializing goes through the same
/// builder so an omitted `root_type` defaults to `target_type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(from = "QuerySpecDocument")]
pub struct QuerySpec {
    pub(crate) target_type: String,
    pub(crate) root_type: String,
    pub(crate) projection_path: Option<String>,
    pub(crate) filters: Vec<Filter>,
    pub(crate) sort_field: Option<String>,
    pub(crate) sort_descending: bool,
    pub(crate) offset: Option<u64>,
    pub(crate) limit: Option<u64>,
    #[serde(skip)]
    pub(crate) unparsed_filters: Vec<UnparsedFilter>,
}

impl QuerySpec {
    /// Entity type of the returned rows.
    pub fn target_type(&self) -> &str {
        &self.target_type
    }

    /// Entity type filters navigate from.
    pub fn root_type(&self) -> &str {
        &self.root_type
    }

    pub fn projection_path(&self) -> Option<&str> {
        self.projection_path.as_deref()
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn sort_field(&self) -> Option<&str> {
        self.sort_field.as_deref()
    }

    pub fn sort_descending(&self) -> bool {
        self.sort_descending
    }

    pub fn sort_direction(&self) -> SortDirection {
        if self.sort_descending {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Filters from a spec document that never became a [`Filter`].
    ///
    /// They are reported as skipped when the spec is compiled.
    pub fn unparsed_filters(&self) -> &[UnparsedFilter] {
        &self.unparsed_filters
    }

    /// Whether root and target differ (semi-join query).
    pub fn is_rooted_elsewhere(&self) -> bool {
        self.root_type != self.target_type
    }
}

/// Serialized form of a [`QuerySpec`].
#[derive(Debug, Clone, Deserialize)]
struct QuerySpecDocument {
    target_type: String,
    #[serde(default)]
    root_type: Option<String>,
    #[serde(default)]
    projection_path: Option<String>,
    #[serde(default)]
    filters: Vec<FilterDocument>,
    #[serde(default)]
    sort_field: Option<String>,
    #[serde(default)]
    sort_descending: bool,
    #[serde(default)]
    offset: Option<u64>,
    #[serde(default)]
    limit: Option<u64>,
}

impl From<QuerySpecDocument> for QuerySpec {
    fn from(doc: QuerySpecDocument) -> Self {
        let (filters, unparsed): (Vec<_>, Vec<_>) = doc
            .filters
            .into_iter()
            .map(FilterDocument::into_filter)
            .partition(Result::is_ok);
        let mut builder = QuerySpec::builder(doc.target_type)
            .filters(filters.into_iter().flatten())
            .sort_descending(doc.sort_descending);
        if let Some(root) = doc.root_type {
            builder = builder.root_entity_type(root);
        }
        if let Some(path) = doc.projection_path {
            builder = builder.target_path(path);
        }
        if let Some(field) = doc.sort_field {
            builder = builder.sort_field(field);
        }
        if let Some(offset) = doc.offset {
            builder = builder.offset(offset);
        }
        if let Some(limit) = doc.limit {
            builder = builder.limit(limit);
        }
        let mut spec = builder.build();
        spec.unparsed_filters = unparsed.into_iter().filter_map(Result::err).collect();
        spec
    }
}

/// Serialized form of a [`Filter`].
///
/// Operator and values are kept loose so one malformed filter does not
/// reject the whole document.
#[derive(Debug, Clone, Deserialize)]
struct FilterDocument {
    #[serde(default)]
    field_path: String,
    #[serde(default)]
    operator: String,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    value_to: Option<serde_json::Value>,
}

impl FilterDocument {
    fn into_filter(self) -> Result<Filter, UnparsedFilter> {
        let FilterDocument {
            field_path,
            operator: name,
            value,
            value_to,
        } = self;
        let reject = |reason| UnparsedFilter {
            field_path: field_path.clone(),
            operator: name.clone(),
            reason,
        };

        let Some(operator) = Operator::from_name(&name) else {
            return Err(reject(InvalidFilter::UnknownOperator { name: name.clone() }));
        };
        let value = serde_json::from_value(value)
            .map_err(|_| reject(InvalidFilter::UnsupportedValue { operator }))?;
        let value_to = value_to
            .map(serde_json::from_value)
            .transpose()
            .map_err(|_| reject(InvalidFilter::UnsupportedValue { operator }))?;

        Ok(Filter {
            field_path,
            operator,
            value,
            value_to,
        })
    }
}

/// Filter document entry with an unknown operator or unusable value.
#[derive(Debug, Clone, PartialEq)]
pub struct UnparsedFilter {
    pub field_path: String,
    /// Operator name as written in the document.
    pub operator: String,
    pub reason: InvalidFilter,
}

/// Result of a paged find.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T = serde_json::Value> {
    /// Rows inside the pagination window.
    pub items: Vec<T>,

    /// Total matching rows (before paging).
    pub total: u64,

    /// Offset the window started at.
    pub offset: u64,

    /// Window size, `None` when unbounded.
    pub limit: Option<u64>,

    /// Whether rows exist past this window.
    pub has_next: bool,
}

impl<T> Page<T> {
    /// Create a page, computing `has_next` from the window.
    pub fn new(items: Vec<T>, total: u64, offset: u64, limit: Option<u64>) -> Self {
        let end = offset.saturating_add(items.len() as u64);
        Self {
            items,
            total,
            offset,
            limit,
            has_next: end < total,
        }
    }
}
