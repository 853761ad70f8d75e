use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};

use crate::authz::{self, GrantGuard};

pub mod posts;
pub mod session;
pub mod system;

/// Every route that runs behind bootstrap and authentication.
///
/// `post_admin` guards the single-post route; it runs before the handler.
pub fn router(post_admin: GrantGuard) -> Router {
    let guarded = Router::new()
        .route("/posts/:post_id", get(posts::show_post))
        .route_layer(from_fn_with_state(post_admin, authz::require_grant));

    Router::new()
        .route("/posts", post(posts::create_post))
        .route("/posts/:post_id/comments", get(posts::post_comments))
        .route("/login", post(session::login))
        .route("/whoami", get(system::whoami))
        .merge(guarded)
}
