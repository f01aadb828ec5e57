//! Forum entities: users, forums, discussions and posts.
//!
//! Provides the entity registry the query engine navigates and typed records
//! for decoding query results. Counter columns (`post_count`, ...) are
//! maintained elsewhere; the engine only reads them.

use serde::{Deserialize, Serialize};

use crate::query::{EntityDef, EntityRegistry, FieldKind};

/// SQL DDL for the forum tables (portable between PostgreSQL and SQLite).
pub const SCHEMA_SQL: &str = include_str!("../../migrations/0001_forum_schema.sql");

/// A registered forum member.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub age: Option<i64>,
    pub status: Option<String>,
    pub is_admin: bool,
    pub discussion_count: i64,
    pub post_count: i64,
    /// Unix timestamp when created.
    pub created: i64,
}

/// A forum (board) grouping discussions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Forum {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub discussion_count: i64,
    pub post_count: i64,
    pub created: i64,
}

/// A discussion thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Discussion {
    pub id: i64,
    pub forum_id: i64,
    pub author_id: i64,
    pub title: String,
    pub pinned: bool,
    pub view_count: i64,
    pub post_count: i64,
    pub last_post_at: Option<i64>,
    pub created: i64,
}

/// A post inside a discussion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    pub id: i64,
    pub discussion_id: i64,
    /// NULL once the author account is removed.
    pub author_id: Option<i64>,
    pub body: String,
    pub edited_at: Option<i64>,
    pub created: i64,
}

/// Entity definition for `user`.
pub fn user_entity() -> EntityDef {
    EntityDef::new("user", "users")
        .field("id", FieldKind::Integer)
        .field("name", FieldKind::Text)
        .field("email", FieldKind::Text)
        .nullable_field("age", FieldKind::Integer)
        .nullable_field("status", FieldKind::Text)
        .field("is_admin", FieldKind::Boolean)
        .field("discussion_count", FieldKind::Integer)
        .field("post_count", FieldKind::Integer)
        .field("created", FieldKind::Timestamp)
}

/// Entity definition for `forum`.
pub fn forum_entity() -> EntityDef {
    EntityDef::new("forum", "forums")
        .field("id", FieldKind::Integer)
        .field("name", FieldKind::Text)
        .field("slug", FieldKind::Text)
        .nullable_field("description", FieldKind::Text)
        .field("discussion_count", FieldKind::Integer)
        .field("post_count", FieldKind::Integer)
        .field("created", FieldKind::Timestamp)
}

/// Entity definition for `discussion`.
pub fn discussion_entity() -> EntityDef {
    EntityDef::new("discussion", "discussions")
        .field("id", FieldKind::Integer)
        .field("forum_id", FieldKind::Integer)
        .field("author_id", FieldKind::Integer)
        .field("title", FieldKind::Text)
        .field("pinned", FieldKind::Boolean)
        .field("view_count", FieldKind::Integer)
        .field("post_count", FieldKind::Integer)
        .nullable_field("last_post_at", FieldKind::Timestamp)
        .field("created", FieldKind::Timestamp)
        .relation("forum", "forum", "forum_id")
        .relation("author", "user", "author_id")
}

/// Entity definition for `post`.
pub fn post_entity() -> EntityDef {
    EntityDef::new("post", "posts")
        .field("id", FieldKind::Integer)
        .field("discussion_id", FieldKind::Integer)
        .nullable_field("author_id", FieldKind::Integer)
        .field("body", FieldKind::Text)
        .nullable_field("edited_at", FieldKind::Timestamp)
        .field("created", FieldKind::Timestamp)
        .relation("discussion", "discussion", "discussion_id")
        .relation("author", "user", "author_id")
}

/// Registry with every forum entity.
pub fn forum_registry() -> EntityRegistry {
    EntityRegistry::new()
        .with(user_entity())
        .with(forum_entity())
        .with(discussion_entity())
        .with(post_entity())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn registry_contains_all_entities() {
        let registry = forum_registry();
        assert_eq!(registry.names(), vec!["discussion", "forum", "post", "user"]);
    }

    #[test]
    fn relations_point_at_registered_entities() {
        let registry = forum_registry();
        for name in registry.names() {
            let entity = registry.get(name).unwrap();
            for relation in entity.relations() {
                assert!(
                    registry.get(&relation.target).is_some(),
                    "{name}.{} points at unknown entity {}",
                    relation.name,
                    relation.target
                );
                assert!(
                    entity.fields().iter().any(|f| f.column == relation.local_column),
                    "{name}.{} foreign key is not a declared field",
                    relation.name
                );
            }
        }
    }

    #[test]
    fn entity_fields_match_schema_sql() {
        let registry = forum_registry();
        for name in registry.names() {
            let entity = registry.get(name).unwrap();
            assert!(
                SCHEMA_SQL.contains(&format!("CREATE TABLE IF NOT EXISTS {} (", entity.table)),
                "missing table {}",
                entity.table
            );
            for field in entity.fields() {
                assert!(
                    SCHEMA_SQL.contains(&format!("    {} ", field.column)),
                    "missing column {}.{}",
                    entity.table,
                    field.column
                );
            }
        }
    }

    #[test]
    fn post_decodes_from_row_json() {
        let row = serde_json::json!({
            "id": 1,
            "discussion_id": 2,
            "author_id": null,
            "body": "hello",
            "edited_at": null,
            "created": 1700000000
        });
        let post: Post = serde_json::from_value(row).unwrap();
        assert_eq!(post.author_id, None);
        assert_eq!(post.body, "hello");
    }
}
