//! Route-level ACL guard.
//!
//! `is_granted::<Post>(acl, Permission::ADMIN)` builds a guard that, layered
//! on a route with an object id path parameter, requires the current user to
//! hold `admin` (or something implying it) on that post before the handler
//! runs.

use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};

use postguard_auth::{AclResource, AclTarget, Permission, explain_authorization};
use postguard_infra::AclStore;

use crate::app::errors::ApiError;
use crate::context::CurrentUser;

#[derive(Clone)]
pub struct GrantGuard {
    acl: Arc<dyn AclStore>,
    resource_type: &'static str,
    parse_id: fn(&str) -> Option<i64>,
    required: Permission,
}

/// Guard requiring `required` on the `R` named by the route's id parameter.
pub fn is_granted<R: AclResource>(acl: Arc<dyn AclStore>, required: Permission) -> GrantGuard {
    GrantGuard {
        acl,
        resource_type: R::RESOURCE_TYPE,
        parse_id: R::parse_object_id,
        required,
    }
}

/// Middleware enforcing a [`GrantGuard`]. Use with `route_layer` so path
/// parameters are available.
pub async fn require_grant(
    State(guard): State<GrantGuard>,
    Path(params): Path<Vec<(String, String)>>,
    user: Option<CurrentUser>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let object_id = params
        .first()
        .and_then(|(_, raw)| (guard.parse_id)(raw))
        .ok_or_else(|| ApiError::not_found(guard.resource_type))?;
    let target = AclTarget::object(guard.resource_type, object_id);

    let user = user.ok_or_else(|| ApiError::unauthenticated("authentication required"))?;
    let grants = guard.acl.grants_for(user.user_id(), &target).await?;
    let explanation = explain_authorization(user.user_id(), &grants, &target, &guard.required);

    if !explanation.granted {
        tracing::warn!(
            user_id = user.user_id().get(),
            target = %target,
            required = %guard.required,
            reason = %explanation.reason,
            "access denied"
        );
        return Err(ApiError::Forbidden(format!(
            "missing permission '{}' on {}: {}",
            guard.required, target, explanation.reason
        )));
    }

    tracing::debug!(user_id = user.user_id().get(), target = %target, reason = %explanation.reason, "access granted");
    Ok(next.run(req).await)
}
