use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use postguard_auth::JwtValidator;
use postguard_infra::UserDatastore;

use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::CurrentUser;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
    pub users: Arc<dyn UserDatastore>,
}

/// Resolve the bearer token (if any) into a [`CurrentUser`].
///
/// Requests without an `Authorization` header continue anonymously. A header
/// that is present but unusable, or that names an unknown or inactive user,
/// is rejected with 401.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(token) = extract_bearer(req.headers())? {
        let claims = state
            .jwt
            .validate(token, Utc::now())
            .map_err(|e| ApiError::unauthenticated(e.to_string()))?;

        let user = state
            .users
            .find_user_by_id(claims.sub)
            .await?
            .filter(|u| u.active)
            .ok_or_else(|| ApiError::unauthenticated("unknown or inactive user"))?;

        tracing::debug!(user_id = user.id.get(), "request authenticated");
        req.extensions_mut().insert(CurrentUser::new(user.principal()));
    }

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<Option<&str>, ApiError> {
    let Some(header) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };

    let header = header
        .to_str()
        .map_err(|_| ApiError::unauthenticated("malformed authorization header"))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::unauthenticated("expected a bearer token"))?
        .trim();
    if token.is_empty() {
        return Err(ApiError::unauthenticated("empty bearer token"));
    }

    Ok(Some(token))
}

/// Reset and seed the database before the first request is served.
pub async fn bootstrap_on_first_request(
    State(services): State<Arc<AppServices>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    services.ensure_bootstrapped().await?;
    Ok(next.run(req).await)
}
