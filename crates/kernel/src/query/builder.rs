//! Single-use builder for [`QuerySpec`].

use super::types::{Filter, QuerySpec};

/// Collects query settings and produces an immutable [`QuerySpec`].
///
/// The builder performs no validation; filters are checked when the spec is
/// compiled against a schema.
#[derive(Debug)]
#[must_use]
pub struct QuerySpecBuilder {
    target_type: String,
    root_type: Option<String>,
    projection_path: Option<String>,
    filters: Vec<Filter>,
    sort_field: Option<String>,
    sort_descending: bool,
    offset: Option<u64>,
    limit: Option<u64>,
}

impl QuerySpec {
    /// Start building a query returning rows of `target_type`.
    pub fn builder(target_type: impl Into<String>) -> QuerySpecBuilder {
        QuerySpecBuilder {
            target_type: target_type.into(),
            root_type: None,
            projection_path: None,
            filters: Vec::new(),
            sort_field: None,
            sort_descending: false,
            offset: None,
            limit: None,
        }
    }
}

impl QuerySpecBuilder {
    /// Append a filter; all filters are AND-ed.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Append several filters.
    pub fn filters(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.filters.extend(filters);
        self
    }

    /// Entity type filter paths navigate from, when it differs from the target.
    pub fn root_entity_type(mut self, root_type: impl Into<String>) -> Self {
        self.root_type = Some(root_type.into());
        self
    }

    /// Single field selected by existence checks and plucks.
    pub fn target_path(mut self, path: impl Into<String>) -> Self {
        self.projection_path = Some(path.into());
        self
    }

    pub fn sort_field(mut self, path: impl Into<String>) -> Self {
        self.sort_field = Some(path.into());
        self
    }

    pub fn sort_descending(mut self, descending: bool) -> Self {
        self.sort_descending = descending;
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Finish the spec. The root type defaults to the target type.
    pub fn build(self) -> QuerySpec {
        let root_type = self
            .root_type
            .unwrap_or_else(|| self.target_type.clone());
        QuerySpec {
            target_type: self.target_type,
            root_type,
            projection_path: self.projection_path,
            filters: self.filters,
            sort_field: self.sort_field,
            sort_descending: self.sort_descending,
            offset: self.offset,
            limit: self.limit,
            unparsed_filters: Vec::new(),
        }
    }
}
