use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    response::Html,
};

use postguard_auth::Permission;
use postguard_core::PostId;
use postguard_infra::datastore::grant_object_access;
use postguard_posts::{NewPost, Post, render_comments};

use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::CurrentUser;

/// Create a post authored by the current user and make them its owner.
pub async fn create_post(
    Extension(services): Extension<Arc<AppServices>>,
    user: CurrentUser,
) -> Result<String, ApiError> {
    let post = services
        .stores
        .posts
        .create_post(NewPost::authored_by(user.user_id(), user.email()))
        .await?;
    grant_object_access(services.stores.acl.as_ref(), user.user_id(), &post, &[Permission::OWNER]).await?;

    tracing::info!(post_id = post.id.get(), user_id = user.user_id().get(), "post created");
    Ok(post.body)
}

/// Body of a single post. Access is checked by the route guard.
pub async fn show_post(
    Extension(services): Extension<Arc<AppServices>>,
    Path(post_id): Path<String>,
) -> Result<String, ApiError> {
    let post = load_post(&services, &post_id).await?;
    Ok(post.body)
}

/// Comments of a post as `<div>` fragments, one per line.
pub async fn post_comments(
    Extension(services): Extension<Arc<AppServices>>,
    Path(post_id): Path<String>,
) -> Result<Html<String>, ApiError> {
    let post = load_post(&services, &post_id).await?;
    let comments = services.stores.posts.comments_for(post.id).await?;
    Ok(Html(render_comments(&comments)))
}

async fn load_post(services: &AppServices, raw_id: &str) -> Result<Post, ApiError> {
    let id: PostId = raw_id.parse().map_err(|_| ApiError::not_found("post"))?;
    services
        .stores
        .posts
        .find_post(id)
        .await?
        .ok_or_else(|| ApiError::not_found("post"))
}
