//! HTTP application wiring.
//!
//! - `services.rs`: datastores, password hashing, token minting, bootstrap
//! - `routes/`: handlers, one file per area
//! - `dto.rs`: request/response bodies
//! - `errors.rs`: JSON error responses

use std::sync::Arc;

use axum::{Extension, Router, middleware::from_fn_with_state, routing::get};
use tower_http::trace::TraceLayer;

use postguard_auth::Permission;
use postguard_infra::{AppConfig, StoreError};
use postguard_posts::Post;

use crate::{authz, middleware};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::AppServices;

/// Build the full HTTP router for `config` (entrypoint used by `main.rs`).
pub async fn build_app(config: &AppConfig) -> Result<Router, StoreError> {
    let services = AppServices::from_config(config).await?;
    Ok(build_router(services))
}

/// Router over already wired services.
///
/// `/health` sits outside the bootstrap and auth layers. Every other request
/// first waits for the fixture bootstrap, then resolves its bearer token.
pub fn build_router(services: Arc<AppServices>) -> Router {
    let auth_state = middleware::AuthState {
        jwt: services.jwt.clone(),
        users: services.stores.users.clone(),
    };
    let post_admin = authz::is_granted::<Post>(services.stores.acl.clone(), Permission::ADMIN);

    let app = routes::router(post_admin)
        .layer(Extension(services.clone()))
        .layer(from_fn_with_state(auth_state, middleware::auth_middleware))
        .layer(from_fn_with_state(services, middleware::bootstrap_on_first_request));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(app)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode, header::AUTHORIZATION},
    };
    use tower::ServiceExt;

    async fn router() -> Router {
        build_app(&AppConfig::for_tests()).await.unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_does_not_require_anything() {
        let res = router().await.oneshot(get("/health")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn guarded_route_rejects_anonymous_callers() {
        let res = router().await.oneshot(get("/posts/1")).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_bearer_is_rejected_even_on_public_routes() {
        let req = Request::builder()
            .uri("/posts/1/comments")
            .header(AUTHORIZATION, "Bearer garbage")
            .body(Body::empty())
            .unwrap();
        let res = router().await.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn comments_of_seeded_post_are_public() {
        let res = router().await.oneshot(get("/posts/2/comments")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
