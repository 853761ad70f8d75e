//! Datastore abstractions for users, ACL grants and posts, plus their
//! SQLite implementations.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use postguard_auth::{AclResource, AclTarget, Grant, LoginTracking, NewUser, Permission, Role, RoleRecord, User};
use postguard_core::{PostId, UserId};
use postguard_posts::{Comment, NewComment, NewPost, Post};

use crate::error::StoreError;

pub mod acl;
pub mod posts;
pub mod users;

pub use acl::SqliteAclStore;
pub use posts::SqlitePostStore;
pub use users::SqliteUserDatastore;

/// Persistence for users, roles and their association.
#[async_trait]
pub trait UserDatastore: Send + Sync {
    async fn create_role(&self, name: &Role, description: Option<&str>) -> Result<RoleRecord, StoreError>;
    async fn find_role(&self, name: &str) -> Result<Option<RoleRecord>, StoreError>;
    async fn find_or_create_role(&self, name: &Role) -> Result<RoleRecord, StoreError>;

    /// Create a user and attach its roles, creating missing roles on the way.
    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Returns `false` when the user already had the role.
    async fn add_role_to_user(&self, user_id: UserId, role: &Role) -> Result<bool, StoreError>;
    /// Returns `false` when the user did not have the role.
    async fn remove_role_from_user(&self, user_id: UserId, role: &Role) -> Result<bool, StoreError>;

    async fn record_login(&self, user_id: UserId, tracking: &LoginTracking) -> Result<(), StoreError>;
    async fn set_active(&self, user_id: UserId, active: bool) -> Result<(), StoreError>;
    async fn confirm_user(&self, user_id: UserId, at: DateTime<Utc>) -> Result<(), StoreError>;
}

/// Persistence for ACL grants.
#[async_trait]
pub trait AclStore: Send + Sync {
    /// Grant every permission in `permissions` on `target`. Re-granting is a no-op.
    async fn grant(&self, user_id: UserId, target: &AclTarget, permissions: &[Permission]) -> Result<(), StoreError>;

    /// Remove the given permissions on exactly `target`. Returns rows removed.
    async fn revoke(&self, user_id: UserId, target: &AclTarget, permissions: &[Permission]) -> Result<u64, StoreError>;

    /// Grants of `user_id` that apply to `target`: grants on the target itself
    /// plus class-level grants on its resource type.
    async fn grants_for(&self, user_id: UserId, target: &AclTarget) -> Result<Vec<Grant>, StoreError>;

    /// Every user's grants on exactly `target`.
    async fn grants_on(&self, target: &AclTarget) -> Result<Vec<Grant>, StoreError>;
}

/// Persistence for posts and their comments.
#[async_trait]
pub trait PostStore: Send + Sync {
    async fn create_post(&self, new_post: NewPost) -> Result<Post, StoreError>;
    async fn find_post(&self, id: PostId) -> Result<Option<Post>, StoreError>;
    async fn posts_by_author(&self, author_id: UserId) -> Result<Vec<Post>, StoreError>;

    async fn add_comment(&self, new_comment: NewComment) -> Result<Comment, StoreError>;
    /// Comments of a post in id order.
    async fn comments_for(&self, post_id: PostId) -> Result<Vec<Comment>, StoreError>;
}

/// Grant object-level access on `object` to `user_id`.
pub async fn grant_object_access<S, R>(
    store: &S,
    user_id: UserId,
    object: &R,
    permissions: &[Permission],
) -> Result<(), StoreError>
where
    S: AclStore + ?Sized,
    R: AclResource + Sync,
{
    store.grant(user_id, &object.acl_target(), permissions).await
}

/// Grant class-level access on every `R` to `user_id`.
pub async fn grant_class_access<S, R>(store: &S, user_id: UserId, permissions: &[Permission]) -> Result<(), StoreError>
where
    S: AclStore + ?Sized,
    R: AclResource,
{
    store.grant(user_id, &R::acl_class(), permissions).await
}

pub async fn revoke_object_access<S, R>(
    store: &S,
    user_id: UserId,
    object: &R,
    permissions: &[Permission],
) -> Result<u64, StoreError>
where
    S: AclStore + ?Sized,
    R: AclResource + Sync,
{
    store.revoke(user_id, &object.acl_target(), permissions).await
}

pub async fn revoke_class_access<S, R>(store: &S, user_id: UserId, permissions: &[Permission]) -> Result<u64, StoreError>
where
    S: AclStore + ?Sized,
    R: AclResource,
{
    store.revoke(user_id, &R::acl_class(), permissions).await
}

/// The set of datastores an application instance runs against.
#[derive(Clone)]
pub struct Datastores {
    pub pool: SqlitePool,
    pub users: Arc<dyn UserDatastore>,
    pub acl: Arc<dyn AclStore>,
    pub posts: Arc<dyn PostStore>,
}

impl Datastores {
    pub fn sqlite(pool: SqlitePool) -> Self {
        Self {
            users: Arc::new(SqliteUserDatastore::new(pool.clone())),
            acl: Arc::new(SqliteAclStore::new(pool.clone())),
            posts: Arc::new(SqlitePostStore::new(pool.clone())),
            pool,
        }
    }
}
