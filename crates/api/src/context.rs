use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use postguard_auth::{Principal, Role};
use postguard_core::UserId;

use crate::app::errors::ApiError;

/// The authenticated user of a request.
///
/// Inserted into request extensions by the auth middleware. Extracting it
/// from a request without a valid bearer token is rejected with 401; use
/// `Option<CurrentUser>` for routes that also serve anonymous callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    principal: Principal,
}

impl CurrentUser {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn user_id(&self) -> UserId {
        self.principal.user_id
    }

    pub fn email(&self) -> &str {
        &self.principal.email
    }

    pub fn roles(&self) -> &[Role] {
        &self.principal.roles
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthenticated("authentication required"))
    }
}
