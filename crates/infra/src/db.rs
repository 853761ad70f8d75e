//! SQLite connection pool and schema management.

use core::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::instrument;

use crate::error::{StoreError, map_sqlx_error};

/// Tables in creation order; dropped in reverse.
const SCHEMA: &[(&str, &str)] = &[
    (
        "roles",
        r#"
        CREATE TABLE roles (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        VARCHAR(80) NOT NULL UNIQUE,
            description VARCHAR(255)
        )
        "#,
    ),
    (
        "users",
        r#"
        CREATE TABLE users (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            email            VARCHAR(255) NOT NULL UNIQUE,
            password         VARCHAR(255) NOT NULL,
            last_login_at    DATETIME,
            current_login_at DATETIME,
            last_login_ip    VARCHAR(100),
            current_login_ip VARCHAR(100),
            login_count      INTEGER NOT NULL DEFAULT 0,
            active           BOOLEAN NOT NULL DEFAULT 1,
            confirmed_at     DATETIME
        )
        "#,
    ),
    (
        "roles_users",
        r#"
        CREATE TABLE roles_users (
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            role_id INTEGER NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
            PRIMARY KEY (user_id, role_id)
        )
        "#,
    ),
    (
        "posts",
        r#"
        CREATE TABLE posts (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            body      VARCHAR(255) NOT NULL,
            author_id INTEGER NOT NULL REFERENCES users(id)
        )
        "#,
    ),
    (
        "comments",
        r#"
        CREATE TABLE comments (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            body      VARCHAR(255) NOT NULL,
            author_id INTEGER NOT NULL REFERENCES users(id),
            post_id   INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE
        )
        "#,
    ),
    (
        "acl_grants",
        r#"
        CREATE TABLE acl_grants (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id       INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            resource_type VARCHAR(80) NOT NULL,
            object_id     INTEGER,
            permission    VARCHAR(80) NOT NULL,
            granted_at    DATETIME NOT NULL
        )
        "#,
    ),
];

/// Secondary indexes, created after all tables.
const INDEXES: &[&str] = &[
    // NULL object_id marks a class-level grant; fold it so class grants are unique too.
    "CREATE UNIQUE INDEX acl_grants_unique ON acl_grants (user_id, resource_type, IFNULL(object_id, -1), permission)",
    "CREATE INDEX comments_post_id ON comments (post_id)",
    "CREATE INDEX posts_author_id ON posts (author_id)",
];

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

/// Open a pool for `database_url`.
///
/// An in-memory database lives and dies with its connection, so for
/// `sqlite::memory:` the pool holds exactly one connection that is never
/// recycled.
pub async fn connect(database_url: &str) -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| map_sqlx_error("parse_database_url", e))?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool_options = if is_in_memory(database_url) {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(8)
    };

    let pool = pool_options
        .connect_with(options)
        .await
        .map_err(|e| map_sqlx_error("connect", e))?;

    tracing::info!(database_url, "database pool ready");
    Ok(pool)
}

/// Drop every application table (and its indexes).
#[instrument(skip(pool), err)]
pub async fn drop_all(pool: &SqlitePool) -> Result<(), StoreError> {
    let mut tx = pool.begin().await.map_err(|e| map_sqlx_error("begin", e))?;
    for (table, _) in SCHEMA.iter().rev() {
        sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("drop_all", e))?;
    }
    tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
    Ok(())
}

/// Create every application table and index. Fails if any already exists.
#[instrument(skip(pool), err)]
pub async fn create_all(pool: &SqlitePool) -> Result<(), StoreError> {
    let mut tx = pool.begin().await.map_err(|e| map_sqlx_error("begin", e))?;
    for (_, ddl) in SCHEMA {
        sqlx::query(ddl)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("create_all", e))?;
    }
    for ddl in INDEXES {
        sqlx::query(ddl)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("create_index", e))?;
    }
    tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
    Ok(())
}

/// Names of the application tables that currently exist.
pub async fn existing_tables(pool: &SqlitePool) -> Result<Vec<String>, StoreError> {
    let names: Vec<(String,)> = sqlx::query_as(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| map_sqlx_error("existing_tables", e))?;
    Ok(names.into_iter().map(|(n,)| n).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_drop_round_trips_the_schema() {
        let pool = connect("sqlite::memory:").await.unwrap();
        create_all(&pool).await.unwrap();
        assert_eq!(
            existing_tables(&pool).await.unwrap(),
            vec!["acl_grants", "comments", "posts", "roles", "roles_users", "users"]
        );

        // Second create must fail: tables already exist.
        assert!(create_all(&pool).await.is_err());

        drop_all(&pool).await.unwrap();
        assert!(existing_tables(&pool).await.unwrap().is_empty());

        create_all(&pool).await.unwrap();
    }

    #[test]
    fn recognises_in_memory_urls() {
        assert!(is_in_memory("sqlite::memory:"));
        assert!(is_in_memory("sqlite://file:db?mode=memory&cache=shared"));
        assert!(!is_in_memory("sqlite://app.db"));
    }
}
