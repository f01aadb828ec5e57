//! Agora test utilities.
//!
//! Helpers for integration testing: an in-memory forum database, fixture
//! builders for forum rows, and assertion helpers for JSON query results.

use serde_json::Value as JsonValue;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

/// Forum DDL shared with the kernel migrations.
pub const FORUM_SCHEMA: &str = include_str!("../../kernel/migrations/0001_forum_schema.sql");

/// Fixed creation timestamp for fixtures (2024-01-01T00:00:00Z).
pub const FIXTURE_CREATED: i64 = 1_704_067_200;

/// Open a fresh in-memory SQLite database with the forum schema applied.
///
/// The pool holds a single connection that never expires; every new
/// connection to `sqlite::memory:` would otherwise see an empty database.
pub async fn forum_pool() -> Result<SqlitePool, sqlx::Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    sqlx::raw_sql(FORUM_SCHEMA).execute(&pool).await?;
    Ok(pool)
}

/// Create a test user with default values.
pub fn test_user(id: i64, name: &str) -> TestUser {
    TestUser {
        id,
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        age: None,
        status: None,
        is_admin: false,
        created: FIXTURE_CREATED,
    }
}

/// A user fixture builder.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub age: Option<i64>,
    pub status: Option<String>,
    pub is_admin: bool,
    pub created: i64,
}

impl TestUser {
    pub fn with_age(mut self, age: i64) -> Self {
        self.age = Some(age);
        self
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.status = Some(status.to_string());
        self
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = email.to_string();
        self
    }

    /// Mark as administrator.
    pub fn admin(mut self) -> Self {
        self.is_admin = true;
        self
    }

    pub fn created_at(mut self, created: i64) -> Self {
        self.created = created;
        self
    }

    pub async fn insert(&self, pool: &SqlitePool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO users (id, name, email, age, status, is_admin, created) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(self.id)
        .bind(&self.name)
        .bind(&self.email)
        .bind(self.age)
        .bind(&self.status)
        .bind(self.is_admin)
        .bind(self.created)
        .execute(pool)
        .await?;
        Ok(())
    }
}

/// Create a test forum; the slug is derived from the name.
pub fn test_forum(id: i64, name: &str) -> TestForum {
    TestForum {
        id,
        name: name.to_string(),
        slug: name.to_lowercase().replace(' ', "-"),
        description: None,
        created: FIXTURE_CREATED,
    }
}

/// A forum fixture builder.
#[derive(Debug, Clone)]
pub struct TestForum {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub created: i64,
}

impl TestForum {
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub async fn insert(&self, pool: &SqlitePool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO forums (id, name, slug, description, created) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(self.id)
        .bind(&self.name)
        .bind(&self.slug)
        .bind(&self.description)
        .bind(self.created)
        .execute(pool)
        .await?;
        Ok(())
    }
}

/// Create a test discussion in `forum_id` started by `author_id`.
pub fn test_discussion(id: i64, forum_id: i64, author_id: i64, title: &str) -> TestDiscussion {
    TestDiscussion {
        id,
        forum_id,
        author_id,
        title: title.to_string(),
        pinned: false,
        view_count: 0,
        last_post_at: None,
        created: FIXTURE_CREATED,
    }
}

/// A discussion fixture builder.
#[derive(Debug, Clone)]
pub struct TestDiscussion {
    pub id: i64,
    pub forum_id: i64,
    pub author_id: i64,
    pub title: String,
    pub pinned: bool,
    pub view_count: i64,
    pub last_post_at: Option<i64>,
    pub created: i64,
}

impl TestDiscussion {
    pub fn pinned(mut self) -> Self {
        self.pinned = true;
        self
    }

    pub fn with_views(mut self, view_count: i64) -> Self {
        self.view_count = view_count;
        self
    }

    pub fn with_last_post_at(mut self, at: i64) -> Self {
        self.last_post_at = Some(at);
        self
    }

    pub async fn insert(&self, pool: &SqlitePool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO discussions \
             (id, forum_id, author_id, title, pinned, view_count, last_post_at, created) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(self.id)
        .bind(self.forum_id)
        .bind(self.author_id)
        .bind(&self.title)
        .bind(self.pinned)
        .bind(self.view_count)
        .bind(self.last_post_at)
        .bind(self.created)
        .execute(pool)
        .await?;
        Ok(())
    }
}

/// Create a test post in `discussion_id` written by `author_id`.
pub fn test_post(id: i64, discussion_id: i64, author_id: i64, body: &str) -> TestPost {
    TestPost {
        id,
        discussion_id,
        author_id: Some(author_id),
        body: body.to_string(),
        edited_at: None,
        created: FIXTURE_CREATED,
    }
}

/// A post fixture builder.
#[derive(Debug, Clone)]
pub struct TestPost {
    pub id: i64,
    pub discussion_id: i64,
    pub author_id: Option<i64>,
    pub body: String,
    pub edited_at: Option<i64>,
    pub created: i64,
}

impl TestPost {
    /// Detach the post from its author, as after an account removal.
    pub fn orphaned(mut self) -> Self {
        self.author_id = None;
        self
    }

    pub fn edited_at(mut self, at: i64) -> Self {
        self.edited_at = Some(at);
        self
    }

    pub async fn insert(&self, pool: &SqlitePool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO posts (id, discussion_id, author_id, body, edited_at, created) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(self.id)
        .bind(self.discussion_id)
        .bind(self.author_id)
        .bind(&self.body)
        .bind(self.edited_at)
        .bind(self.created)
        .execute(pool)
        .await?;
        Ok(())
    }
}

/// Assertion helpers for JSON query results.
pub mod assert {
    use super::JsonValue;

    /// Assert that a JSON value has a specific key.
    pub fn has_key(value: &JsonValue, key: &str) {
        assert!(
            value.get(key).is_some(),
            "Expected JSON to have key '{}', got: {}",
            key,
            value
        );
    }

    /// Collect one field from every row, in row order.
    pub fn field_values(rows: &[JsonValue], key: &str) -> Vec<JsonValue> {
        rows.iter()
            .map(|row| row.get(key).cloned().unwrap_or(JsonValue::Null))
            .collect()
    }

    /// Assert that rows carry exactly these `id`s, in order.
    pub fn ids_eq(rows: &[JsonValue], expected: &[i64]) {
        let actual: Vec<Option<i64>> = rows
            .iter()
            .map(|row| row.get("id").and_then(JsonValue::as_i64))
            .collect();
        let expected: Vec<Option<i64>> = expected.iter().copied().map(Some).collect();
        assert_eq!(actual, expected, "row ids mismatch, rows: {:?}", rows);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_user_builder() {
        let user = test_user(1, "Alice").with_age(30).with_status("active").admin();

        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.age, Some(30));
        assert_eq!(user.status.as_deref(), Some("active"));
        assert!(user.is_admin);
    }

    #[test]
    fn test_forum_slug() {
        let forum = test_forum(1, "General Chat");
        assert_eq!(forum.slug, "general-chat");
    }

    #[test]
    fn test_post_orphaned() {
        let post = test_post(1, 1, 7, "hello").orphaned();
        assert_eq!(post.author_id, None);
    }

    #[test]
    fn test_assertions() {
        let rows = vec![
            serde_json::json!({"id": 1, "name": "a"}),
            serde_json::json!({"id": 2}),
        ];
        assert::has_key(&rows[0], "name");
        assert::ids_eq(&rows, &[1, 2]);
        assert_eq!(
            assert::field_values(&rows, "name"),
            vec![serde_json::json!("a"), JsonValue::Null]
        );
    }

    #[tokio::test]
    async fn test_forum_pool_applies_schema() {
        let pool = forum_pool().await.unwrap();
        test_user(1, "Alice").insert(&pool).await.unwrap();
        test_forum(1, "General").insert(&pool).await.unwrap();
        test_discussion(1, 1, 1, "Welcome").insert(&pool).await.unwrap();
        test_post(1, 1, 1, "First!").insert(&pool).await.unwrap();

        let posts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(posts, 1);
    }
}
