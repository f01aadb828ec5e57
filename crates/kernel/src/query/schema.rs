//! Entity schema metadata consumed by the path resolver.
//!
//! An [`EntityRegistry`] maps entity type names to [`EntityDef`]s describing
//! the backing table, scalar fields and to-one relations.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Storage kind of a scalar field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Integer,
    Float,
    Text,
    Boolean,
    Uuid,
    /// Unix timestamp in seconds.
    Timestamp,
}

impl FieldKind {
    /// Whether values of this kind have a total order usable by range operators.
    pub fn is_ordered(self) -> bool {
        !matches!(self, FieldKind::Boolean)
    }
}

/// Scalar field of an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub column: String,
    pub kind: FieldKind,
    pub nullable: bool,
}

/// To-one relation from an entity to another entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDef {
    /// Path segment naming the relation.
    pub name: String,
    /// Entity type the relation points at.
    pub target: String,
    /// Foreign-key column on the owning table.
    pub local_column: String,
}

/// Entity type definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDef {
    pub name: String,
    pub table: String,
    pub primary_key: String,
    fields: Vec<FieldDef>,
    relations: Vec<RelationDef>,
}

impl EntityDef {
    /// Create an entity backed by `table` with an `id` primary key.
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            primary_key: "id".to_string(),
            fields: Vec::new(),
            relations: Vec::new(),
        }
    }

    /// Override the primary key field name.
    pub fn primary_key(mut self, field: impl Into<String>) -> Self {
        self.primary_key = field.into();
        self
    }

    /// Add a NOT NULL field stored in a column of the same name.
    pub fn field(self, name: &str, kind: FieldKind) -> Self {
        self.column_field(name, name, kind, false)
    }

    /// Add a nullable field stored in a column of the same name.
    pub fn nullable_field(self, name: &str, kind: FieldKind) -> Self {
        self.column_field(name, name, kind, true)
    }

    /// Add a field whose column name differs from the field name.
    pub fn column_field(
        mut self,
        name: impl Into<String>,
        column: impl Into<String>,
        kind: FieldKind,
        nullable: bool,
    ) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            column: column.into(),
            kind,
            nullable,
        });
        self
    }

    /// Add a to-one relation stored in `local_column`.
    pub fn relation(
        mut self,
        name: impl Into<String>,
        target: impl Into<String>,
        local_column: impl Into<String>,
    ) -> Self {
        self.relations.push(RelationDef {
            name: name.into(),
            target: target.into(),
            local_column: local_column.into(),
        });
        self
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn relations(&self) -> &[RelationDef] {
        &self.relations
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn get_relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Primary key field definition, if declared as a field.
    pub fn primary_key_field(&self) -> Option<&FieldDef> {
        self.get_field(&self.primary_key)
    }

    /// Primary key column name.
    pub fn primary_key_column(&self) -> &str {
        self.primary_key_field()
            .map(|f| f.column.as_str())
            .unwrap_or(&self.primary_key)
    }

    /// First declared relation pointing at `target`.
    pub fn relation_to(&self, target: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.target == target)
    }

    /// Rewrite backend-specific encodings in a fetched row.
    ///
    /// Boolean fields read back from stores without a native boolean type
    /// arrive as `0`/`1` and are turned into JSON booleans.
    pub fn normalize_row(&self, row: &mut serde_json::Value) {
        let Some(obj) = row.as_object_mut() else {
            return;
        };
        for field in self.fields.iter().filter(|f| f.kind == FieldKind::Boolean) {
            if let Some(value) = obj.get_mut(&field.name)
                && let Some(n) = value.as_i64()
            {
                *value = serde_json::Value::Bool(n != 0);
            }
        }
    }
}

/// Registry of entity definitions keyed by entity type name.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    entities: HashMap<String, EntityDef>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity, replacing any previous definition with the same name.
    pub fn register(&mut self, entity: EntityDef) {
        self.entities.insert(entity.name.clone(), entity);
    }

    /// Builder-style registration.
    pub fn with(mut self, entity: EntityDef) -> Self {
        self.register(entity);
        self
    }

    pub fn get(&self, name: &str) -> Option<&EntityDef> {
        self.entities.get(name)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entity type names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entities.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn post() -> EntityDef {
        EntityDef::new("post", "posts")
            .field("id", FieldKind::Integer)
            .field("body", FieldKind::Text)
            .nullable_field("hidden", FieldKind::Boolean)
            .column_field("posted", "created_at", FieldKind::Timestamp, false)
            .relation("author", "user", "author_id")
    }

    #[test]
    fn entity_lookups() {
        let entity = post();

        assert_eq!(entity.get_field("body").map(|f| f.kind), Some(FieldKind::Text));
        assert_eq!(
            entity.get_field("posted").map(|f| f.column.as_str()),
            Some("created_at")
        );
        assert!(entity.get_field("author").is_none());
        assert_eq!(
            entity.get_relation("author").map(|r| r.target.as_str()),
            Some("user")
        );
        assert_eq!(entity.primary_key_column(), "id");
        assert!(entity.relation_to("user").is_some());
        assert!(entity.relation_to("forum").is_none());
    }

    #[test]
    fn normalize_row_converts_booleans() {
        let entity = post();
        let mut row = serde_json::json!({"id": 1, "body": "x", "hidden": 1});
        entity.normalize_row(&mut row);

        assert_eq!(row["hidden"], serde_json::json!(true));
        assert_eq!(row["id"], serde_json::json!(1));

        let mut null_row = serde_json::json!({"hidden": null});
        entity.normalize_row(&mut null_row);
        assert!(null_row["hidden"].is_null());
    }

    #[test]
    fn field_kind_ordering() {
        assert!(FieldKind::Integer.is_ordered());
        assert!(FieldKind::Text.is_ordered());
        assert!(!FieldKind::Boolean.is_ordered());
    }

    #[test]
    fn registry_register_and_names() {
        let registry = EntityRegistry::new()
            .with(post())
            .with(EntityDef::new("user", "users").field("id", FieldKind::Integer));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["post", "user"]);
        assert!(registry.get("forum").is_none());
    }
}
