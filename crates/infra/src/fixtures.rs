//! Deterministic fixture data: three users, one post each, one comment per
//! post from a different user, and an `owner` grant for each author.

use tracing::instrument;

use postguard_auth::{NewUser, PasswordHasher, Permission, Role, User};
use postguard_posts::{NewComment, NewPost, Post};

use crate::datastore::{Datastores, grant_object_access};
use crate::db;
use crate::error::StoreError;

pub const FIXTURE_PASSWORD: &str = "password";

/// Roles created before any fixture user.
pub const FIXTURE_ROLES: &[&str] = &["admin", "editor", "author"];

#[derive(Debug, Clone, Copy)]
pub struct FixtureUser {
    pub email: &'static str,
    pub roles: &'static [&'static str],
    pub active: bool,
}

pub const FIXTURE_USERS: &[FixtureUser] = &[
    FixtureUser {
        email: "matt@lp.com",
        roles: &["admin"],
        active: true,
    },
    FixtureUser {
        email: "joe@lp.com",
        roles: &["editor"],
        active: true,
    },
    FixtureUser {
        email: "tiya@lp.com",
        roles: &[],
        active: false,
    },
];

/// (post author, commenter) pairs; each commenter differs from the author.
const POST_THREADS: &[(&str, &str)] = &[
    ("matt@lp.com", "tiya@lp.com"),
    ("joe@lp.com", "matt@lp.com"),
    ("tiya@lp.com", "joe@lp.com"),
];

/// Create the fixture roles and users.
#[instrument(skip_all, err)]
pub async fn populate_users(stores: &Datastores, hasher: &PasswordHasher) -> Result<Vec<User>, StoreError> {
    for role in FIXTURE_ROLES {
        stores.users.find_or_create_role(&Role::new(*role)).await?;
    }

    let mut users = Vec::with_capacity(FIXTURE_USERS.len());
    for fixture in FIXTURE_USERS {
        let hash = hasher
            .hash(FIXTURE_PASSWORD)
            .map_err(|e| StoreError::Validation(e.to_string()))?;
        let new_user = NewUser::new(fixture.email, hash)?
            .active(fixture.active)
            .with_roles(fixture.roles.iter().map(|r| Role::new(*r)));
        users.push(stores.users.create_user(new_user).await?);
    }
    Ok(users)
}

async fn require_user(stores: &Datastores, email: &str) -> Result<User, StoreError> {
    stores
        .users
        .find_user_by_email(email)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("fixture user {email}")))
}

/// Create one post per fixture user with a comment from another user, then
/// grant each author `owner` on their post.
#[instrument(skip_all, err)]
pub async fn populate_acl_data(stores: &Datastores) -> Result<Vec<Post>, StoreError> {
    let mut threads = Vec::with_capacity(POST_THREADS.len());
    for (author_email, commenter_email) in POST_THREADS {
        let author = require_user(stores, author_email).await?;
        let commenter = require_user(stores, commenter_email).await?;

        let post = stores
            .posts
            .create_post(NewPost::authored_by(author.id, &author.email))
            .await?;
        stores
            .posts
            .add_comment(NewComment::authored_by(post.id, commenter.id, &commenter.email))
            .await?;
        threads.push((author, post));
    }

    let mut posts = Vec::with_capacity(threads.len());
    for (author, post) in threads {
        grant_object_access(stores.acl.as_ref(), author.id, &post, &[Permission::OWNER]).await?;
        posts.push(post);
    }
    Ok(posts)
}

/// Reset the schema and load every fixture.
#[instrument(skip_all, err)]
pub async fn bootstrap(stores: &Datastores, hasher: &PasswordHasher) -> Result<(), StoreError> {
    db::drop_all(&stores.pool).await?;
    db::create_all(&stores.pool).await?;
    let users = populate_users(stores, hasher).await?;
    let posts = populate_acl_data(stores).await?;
    tracing::info!(users = users.len(), posts = posts.len(), "fixtures loaded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use postguard_auth::{AclResource, PasswordScheme, is_granted};

    async fn seeded() -> Datastores {
        let pool = db::connect("sqlite::memory:").await.unwrap();
        let stores = Datastores::sqlite(pool);
        bootstrap(&stores, &PasswordHasher::new(PasswordScheme::Plaintext))
            .await
            .unwrap();
        stores
    }

    #[tokio::test]
    async fn each_author_owns_exactly_one_post() {
        let stores = seeded().await;
        for fixture in FIXTURE_USERS {
            let user = stores
                .users
                .find_user_by_email(fixture.email)
                .await
                .unwrap()
                .unwrap();
            let posts = stores.posts.posts_by_author(user.id).await.unwrap();
            assert_eq!(posts.len(), 1, "{}", fixture.email);
            assert_eq!(posts[0].body, format!("{} post content", fixture.email));

            let grants = stores.acl.grants_on(&posts[0].acl_target()).await.unwrap();
            assert_eq!(grants.len(), 1);
            assert_eq!(grants[0].user_id, user.id);
            assert_eq!(grants[0].permission, Permission::OWNER);
        }
    }

    #[tokio::test]
    async fn comments_rotate_between_users() {
        let stores = seeded().await;
        for (author, commenter) in POST_THREADS {
            let user = stores.users.find_user_by_email(author).await.unwrap().unwrap();
            let post = &stores.posts.posts_by_author(user.id).await.unwrap()[0];
            let comments = stores.posts.comments_for(post.id).await.unwrap();
            assert_eq!(comments.len(), 1);
            assert_eq!(comments[0].body, format!("{commenter} comment content"));
            assert_ne!(comments[0].author_id, user.id);
        }
    }

    #[tokio::test]
    async fn matt_may_administer_only_his_own_post() {
        let stores = seeded().await;
        let matt = stores.users.find_user_by_email("matt@lp.com").await.unwrap().unwrap();
        let joe = stores.users.find_user_by_email("joe@lp.com").await.unwrap().unwrap();
        let matts_post = &stores.posts.posts_by_author(matt.id).await.unwrap()[0];
        let joes_post = &stores.posts.posts_by_author(joe.id).await.unwrap()[0];

        let own = matts_post.acl_target();
        let grants = stores.acl.grants_for(matt.id, &own).await.unwrap();
        assert!(is_granted(matt.id, &grants, &own, &Permission::ADMIN));

        let other = joes_post.acl_target();
        let grants = stores.acl.grants_for(matt.id, &other).await.unwrap();
        assert!(!is_granted(matt.id, &grants, &other, &Permission::ADMIN));
    }

    #[tokio::test]
    async fn users_get_their_roles_and_active_flags() {
        let stores = seeded().await;
        let matt = stores.users.find_user_by_email("matt@lp.com").await.unwrap().unwrap();
        let tiya = stores.users.find_user_by_email("tiya@lp.com").await.unwrap().unwrap();
        assert!(matt.has_role("admin"));
        assert!(matt.active);
        assert!(tiya.roles.is_empty());
        assert!(!tiya.active);
        assert!(stores.users.find_role("author").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn bootstrap_is_repeatable() {
        let stores = seeded().await;
        bootstrap(&stores, &PasswordHasher::new(PasswordScheme::Plaintext))
            .await
            .unwrap();
        let matt = stores.users.find_user_by_email("matt@lp.com").await.unwrap().unwrap();
        assert_eq!(stores.posts.posts_by_author(matt.id).await.unwrap().len(), 1);
        assert_eq!(stores.acl.grants_for(matt.id, &Post::acl_class()).await.unwrap().len(), 0);
    }
}
