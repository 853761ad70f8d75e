//! SQLite-backed user and role datastore.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};
use tracing::instrument;

use postguard_auth::{LoginTracking, NewUser, Role, RoleRecord, User};
use postguard_core::{RoleId, UserId};

use super::UserDatastore;
use crate::error::{StoreError, map_sqlx_error};

#[derive(Debug, Clone)]
pub struct SqliteUserDatastore {
    pool: SqlitePool,
}

impl SqliteUserDatastore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load_roles(&self, user_id: i64) -> Result<Vec<Role>, StoreError> {
        let names: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT r.name
            FROM roles r
            JOIN roles_users ru ON ru.role_id = r.id
            WHERE ru.user_id = ?1
            ORDER BY r.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_roles", e))?;

        Ok(names.into_iter().map(|(n,)| Role::new(n)).collect())
    }

    async fn hydrate(&self, row: Option<UserRow>) -> Result<Option<User>, StoreError> {
        match row {
            Some(row) => {
                let roles = self.load_roles(row.id).await?;
                Ok(Some(row.into_user(roles)))
            }
            None => Ok(None),
        }
    }
}

fn ensure_user_updated(user_id: UserId, operation: &str, rows_affected: u64) -> Result<(), StoreError> {
    if rows_affected == 0 {
        return Err(StoreError::NotFound(format!("user {user_id} ({operation})")));
    }
    Ok(())
}

#[derive(Debug, FromRow)]
struct RoleRow {
    id: i64,
    name: String,
    description: Option<String>,
}

impl From<RoleRow> for RoleRecord {
    fn from(row: RoleRow) -> Self {
        RoleRecord {
            id: RoleId::new(row.id),
            name: Role::new(row.name),
            description: row.description,
        }
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    email: String,
    password: String,
    last_login_at: Option<DateTime<Utc>>,
    current_login_at: Option<DateTime<Utc>>,
    last_login_ip: Option<String>,
    current_login_ip: Option<String>,
    login_count: i64,
    active: bool,
    confirmed_at: Option<DateTime<Utc>>,
}

impl UserRow {
    fn into_user(self, roles: Vec<Role>) -> User {
        User {
            id: UserId::new(self.id),
            email: self.email,
            password: self.password,
            last_login_at: self.last_login_at,
            current_login_at: self.current_login_at,
            last_login_ip: self.last_login_ip,
            current_login_ip: self.current_login_ip,
            login_count: self.login_count,
            active: self.active,
            confirmed_at: self.confirmed_at,
            roles,
        }
    }
}

const USER_COLUMNS: &str = "id, email, password, last_login_at, current_login_at, last_login_ip, \
                            current_login_ip, login_count, active, confirmed_at";

/// Insert the role if missing and return its id, inside `tx`.
async fn upsert_role_id(tx: &mut Transaction<'_, Sqlite>, name: &Role) -> Result<i64, StoreError> {
    sqlx::query("INSERT OR IGNORE INTO roles (name) VALUES (?1)")
        .bind(name.as_str())
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("upsert_role", e))?;

    let (id,): (i64,) = sqlx::query_as("SELECT id FROM roles WHERE name = ?1")
        .bind(name.as_str())
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("upsert_role", e))?;
    Ok(id)
}

#[async_trait]
impl UserDatastore for SqliteUserDatastore {
    #[instrument(skip(self), fields(role = %name), err)]
    async fn create_role(&self, name: &Role, description: Option<&str>) -> Result<RoleRecord, StoreError> {
        let result = sqlx::query("INSERT INTO roles (name, description) VALUES (?1, ?2)")
            .bind(name.as_str())
            .bind(description)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("create_role", e))?;

        Ok(RoleRecord {
            id: RoleId::new(result.last_insert_rowid()),
            name: name.clone(),
            description: description.map(str::to_string),
        })
    }

    async fn find_role(&self, name: &str) -> Result<Option<RoleRecord>, StoreError> {
        let row: Option<RoleRow> = sqlx::query_as("SELECT id, name, description FROM roles WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_role", e))?;
        Ok(row.map(RoleRecord::from))
    }

    async fn find_or_create_role(&self, name: &Role) -> Result<RoleRecord, StoreError> {
        if let Some(existing) = self.find_role(name.as_str()).await? {
            return Ok(existing);
        }
        match self.create_role(name, None).await {
            // Lost a race with a concurrent creator.
            Err(StoreError::Conflict(_)) => self
                .find_role(name.as_str())
                .await?
                .ok_or_else(|| StoreError::NotFound(format!("role {name}"))),
            other => other,
        }
    }

    #[instrument(skip(self, new_user), fields(email = %new_user.email), err)]
    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("begin", e))?;

        let result = sqlx::query("INSERT INTO users (email, password, active) VALUES (?1, ?2, ?3)")
            .bind(&new_user.email)
            .bind(&new_user.password_hash)
            .bind(new_user.active)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("create_user", e))?;
        let user_id = result.last_insert_rowid();

        let mut roles = new_user.roles.clone();
        roles.sort();
        roles.dedup();
        for role in &roles {
            let role_id = upsert_role_id(&mut tx, role).await?;
            sqlx::query("INSERT INTO roles_users (user_id, role_id) VALUES (?1, ?2)")
                .bind(user_id)
                .bind(role_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("create_user_roles", e))?;
        }

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        tracing::debug!(user_id, "user created");

        Ok(User {
            id: UserId::new(user_id),
            email: new_user.email,
            password: new_user.password_hash,
            last_login_at: None,
            current_login_at: None,
            last_login_ip: None,
            current_login_ip: None,
            login_count: 0,
            active: new_user.active,
            confirmed_at: None,
            roles,
        })
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"))
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user_by_email", e))?;
        self.hydrate(row).await
    }

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user_by_id", e))?;
        self.hydrate(row).await
    }

    #[instrument(skip(self), fields(role = %role), err)]
    async fn add_role_to_user(&self, user_id: UserId, role: &Role) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("begin", e))?;
        let role_id = upsert_role_id(&mut tx, role).await?;
        let result = sqlx::query("INSERT OR IGNORE INTO roles_users (user_id, role_id) VALUES (?1, ?2)")
            .bind(user_id.get())
            .bind(role_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("add_role_to_user", e))?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(role = %role), err)]
    async fn remove_role_from_user(&self, user_id: UserId, role: &Role) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM roles_users
            WHERE user_id = ?1 AND role_id = (SELECT id FROM roles WHERE name = ?2)
            "#,
        )
        .bind(user_id.get())
        .bind(role.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("remove_role_from_user", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, tracking), err)]
    async fn record_login(&self, user_id: UserId, tracking: &LoginTracking) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET last_login_at = ?2,
                current_login_at = ?3,
                last_login_ip = ?4,
                current_login_ip = ?5,
                login_count = ?6
            WHERE id = ?1
            "#,
        )
        .bind(user_id.get())
        .bind(tracking.last_login_at)
        .bind(tracking.current_login_at)
        .bind(tracking.last_login_ip.as_deref())
        .bind(tracking.current_login_ip.as_deref())
        .bind(tracking.login_count)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("record_login", e))?;
        ensure_user_updated(user_id, "record_login", result.rows_affected())
    }

    #[instrument(skip(self), err)]
    async fn set_active(&self, user_id: UserId, active: bool) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE users SET active = ?2 WHERE id = ?1")
            .bind(user_id.get())
            .bind(active)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("set_active", e))?;
        ensure_user_updated(user_id, "set_active", result.rows_affected())
    }

    #[instrument(skip(self), err)]
    async fn confirm_user(&self, user_id: UserId, at: DateTime<Utc>) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE users SET confirmed_at = ?2 WHERE id = ?1")
            .bind(user_id.get())
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("confirm_user", e))?;
        ensure_user_updated(user_id, "confirm_user", result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn store() -> SqliteUserDatastore {
        let pool = db::connect("sqlite::memory:").await.unwrap();
        db::create_all(&pool).await.unwrap();
        SqliteUserDatastore::new(pool)
    }

    #[tokio::test]
    async fn create_user_attaches_roles_and_creates_missing_ones() {
        let store = store().await;
        let new_user = NewUser::new("matt@lp.com", "plaintext$password")
            .unwrap()
            .with_roles([Role::new("admin"), Role::new("editor"), Role::new("admin")]);
        let created = store.create_user(new_user).await.unwrap();
        assert_eq!(created.roles, vec![Role::new("admin"), Role::new("editor")]);

        let loaded = store.find_user_by_email("matt@lp.com").await.unwrap().unwrap();
        assert_eq!(loaded.id, created.id);
        assert_eq!(loaded.roles, created.roles);
        assert!(loaded.active);
        assert_eq!(loaded.login_count, 0);
        assert!(store.find_role("editor").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let store = store().await;
        store
            .create_user(NewUser::new("joe@lp.com", "plaintext$a").unwrap())
            .await
            .unwrap();
        let err = store
            .create_user(NewUser::new("joe@lp.com", "plaintext$b").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn roles_can_be_added_and_removed() {
        let store = store().await;
        let user = store
            .create_user(NewUser::new("tiya@lp.com", "plaintext$a").unwrap())
            .await
            .unwrap();
        let author = Role::new("author");

        assert!(store.add_role_to_user(user.id, &author).await.unwrap());
        assert!(!store.add_role_to_user(user.id, &author).await.unwrap());
        assert!(store.find_user_by_id(user.id).await.unwrap().unwrap().has_role("author"));

        assert!(store.remove_role_from_user(user.id, &author).await.unwrap());
        assert!(!store.remove_role_from_user(user.id, &author).await.unwrap());
        assert!(store.find_user_by_id(user.id).await.unwrap().unwrap().roles.is_empty());
    }

    #[tokio::test]
    async fn find_or_create_role_is_idempotent() {
        let store = store().await;
        let a = store.find_or_create_role(&Role::new("admin")).await.unwrap();
        let b = store.find_or_create_role(&Role::new("admin")).await.unwrap();
        assert_eq!(a.id, b.id);
        assert!(matches!(
            store.create_role(&Role::new("admin"), None).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn login_tracking_and_flags_are_persisted() {
        let store = store().await;
        let user = store
            .create_user(NewUser::new("matt@lp.com", "plaintext$a").unwrap())
            .await
            .unwrap();

        let tracking = user.tracked_login(Utc::now(), Some("127.0.0.1".into()));
        store.record_login(user.id, &tracking).await.unwrap();
        store.set_active(user.id, false).await.unwrap();
        store.confirm_user(user.id, Utc::now()).await.unwrap();

        let loaded = store.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(loaded.login_count, 1);
        assert_eq!(loaded.current_login_ip.as_deref(), Some("127.0.0.1"));
        assert!(loaded.current_login_at.is_some());
        assert!(!loaded.active);
        assert!(loaded.is_confirmed());
    }

    #[tokio::test]
    async fn updates_on_missing_users_are_not_found() {
        let store = store().await;
        let err = store.set_active(UserId::new(999), true).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
