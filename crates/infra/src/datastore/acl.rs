//! SQLite-backed ACL grant store.
//!
//! Grants live in `acl_grants`; a NULL `object_id` marks a class-level grant
//! covering every object of `resource_type`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::instrument;

use postguard_auth::{AclTarget, Grant, Permission};
use postguard_core::UserId;

use super::AclStore;
use crate::error::{StoreError, map_sqlx_error};

#[derive(Debug, Clone)]
pub struct SqliteAclStore {
    pool: SqlitePool,
}

impl SqliteAclStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct GrantRow {
    user_id: i64,
    resource_type: String,
    object_id: Option<i64>,
    permission: String,
    granted_at: DateTime<Utc>,
}

impl From<GrantRow> for Grant {
    fn from(row: GrantRow) -> Self {
        let target = match row.object_id {
            Some(object_id) => AclTarget::object(row.resource_type, object_id),
            None => AclTarget::class(row.resource_type),
        };
        Grant {
            user_id: UserId::new(row.user_id),
            target,
            permission: Permission::new(row.permission),
            granted_at: row.granted_at,
        }
    }
}

#[async_trait]
impl AclStore for SqliteAclStore {
    #[instrument(skip(self, permissions), fields(target = %target), err)]
    async fn grant(&self, user_id: UserId, target: &AclTarget, permissions: &[Permission]) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("begin", e))?;
        for permission in permissions {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO acl_grants (user_id, resource_type, object_id, permission, granted_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(user_id.get())
            .bind(target.resource_type())
            .bind(target.object_id())
            .bind(permission.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("grant", e))?;
        }
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;

        tracing::info!(
            user_id = user_id.get(),
            target = %target,
            permissions = ?permissions.iter().map(Permission::as_str).collect::<Vec<_>>(),
            "access granted"
        );
        Ok(())
    }

    #[instrument(skip(self, permissions), fields(target = %target), err)]
    async fn revoke(&self, user_id: UserId, target: &AclTarget, permissions: &[Permission]) -> Result<u64, StoreError> {
        let mut removed = 0;
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("begin", e))?;
        for permission in permissions {
            let result = sqlx::query(
                r#"
                DELETE FROM acl_grants
                WHERE user_id = ?1
                  AND resource_type = ?2
                  AND object_id IS ?3
                  AND permission = ?4
                "#,
            )
            .bind(user_id.get())
            .bind(target.resource_type())
            .bind(target.object_id())
            .bind(permission.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("revoke", e))?;
            removed += result.rows_affected();
        }
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(removed)
    }

    async fn grants_for(&self, user_id: UserId, target: &AclTarget) -> Result<Vec<Grant>, StoreError> {
        let rows: Vec<GrantRow> = sqlx::query_as(
            r#"
            SELECT user_id, resource_type, object_id, permission, granted_at
            FROM acl_grants
            WHERE user_id = ?1
              AND resource_type = ?2
              AND (object_id IS NULL OR object_id = ?3)
            ORDER BY id
            "#,
        )
        .bind(user_id.get())
        .bind(target.resource_type())
        .bind(target.object_id())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("grants_for", e))?;

        Ok(rows.into_iter().map(Grant::from).collect())
    }

    async fn grants_on(&self, target: &AclTarget) -> Result<Vec<Grant>, StoreError> {
        let rows: Vec<GrantRow> = sqlx::query_as(
            r#"
            SELECT user_id, resource_type, object_id, permission, granted_at
            FROM acl_grants
            WHERE resource_type = ?1 AND object_id IS ?2
            ORDER BY id
            "#,
        )
        .bind(target.resource_type())
        .bind(target.object_id())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("grants_on", e))?;

        Ok(rows.into_iter().map(Grant::from).collect())
    }
}
