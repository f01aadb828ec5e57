#![allow(clippy::unwrap_used, clippy::expect_used)]
//! PostgreSQL store integration tests.
//!
//! Needs a PostgreSQL `DATABASE_URL`; each test skips otherwise. Every run
//! works inside its own throwaway schema.

use std::sync::Arc;
use std::time::Duration;

use agora_kernel::models::forum::SCHEMA_SQL;
use agora_kernel::models::{User, forum_registry};
use agora_kernel::query::{Filter, QueryEngine, QuerySpec};
use agora_kernel::store::PgStore;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

fn postgres_url() -> Option<String> {
    dotenvy::dotenv().ok();
    std::env::var("DATABASE_URL")
        .ok()
        .filter(|url| url.starts_with("postgres://") || url.starts_with("postgresql://"))
}

/// Pool whose connections resolve unqualified tables in `schema`.
async fn scoped_pool(url: &str, schema: &str) -> PgPool {
    let admin = PgPoolOptions::new().max_connections(1).connect(url).await.unwrap();
    sqlx::query(&format!("CREATE SCHEMA \"{schema}\""))
        .execute(&admin)
        .await
        .unwrap();
    admin.close().await;

    let search_path = format!("SET search_path TO \"{schema}\"");
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .after_connect(move |conn, _meta| {
            let search_path = search_path.clone();
            Box::pin(async move {
                sqlx::query(&search_path).execute(conn).await?;
                Ok(())
            })
        })
        .connect(url)
        .await
        .unwrap();
    sqlx::raw_sql(SCHEMA_SQL).execute(&pool).await.unwrap();
    pool
}

async fn drop_schema(pool: &PgPool, schema: &str) {
    sqlx::query(&format!("DROP SCHEMA \"{schema}\" CASCADE"))
        .execute(pool)
        .await
        .unwrap();
}

#[tokio::test]
async fn pg_store_runs_find_count_exists() {
    let Some(url) = postgres_url() else {
        eprintln!("DATABASE_URL is not a PostgreSQL URL; skipping");
        return;
    };
    let schema = format!("agora_test_{}", uuid::Uuid::now_v7().simple());
    let pool = scoped_pool(&url, &schema).await;

    for (id, name, age, admin) in [(1_i64, "Alice", 30_i64, false), (2, "Bob", 40, true)] {
        sqlx::query(
            "INSERT INTO users (id, name, email, age, is_admin, created) \
             VALUES ($1, $2, $3, $4, $5, 0)",
        )
        .bind(id)
        .bind(name)
        .bind(format!("{}@example.com", name.to_lowercase()))
        .bind(age)
        .bind(admin)
        .execute(&pool)
        .await
        .unwrap();
    }

    let store = PgStore::new(pool.clone()).with_statement_timeout(Duration::from_secs(5));
    let engine = QueryEngine::new(Arc::new(forum_registry()));
    let spec = QuerySpec::builder("user")
        .filter(Filter::gt("age", 35.5))
        .build();

    let users: Vec<User> = engine.find_as(&store, &spec).await.unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].name, "Bob");
    assert!(users[0].is_admin);

    assert_eq!(engine.count(&store, &spec).await.unwrap(), 1);
    assert!(engine.exists(&store, &spec).await.unwrap());

    drop_schema(&pool, &schema).await;
}
