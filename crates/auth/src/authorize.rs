use serde::Serialize;

use postguard_core::UserId;

use crate::{AclTarget, Grant, Permission};

/// The grant that satisfies `required` on `target` for `user_id`, if any.
fn satisfying_grant<'a>(
    user_id: UserId,
    grants: &'a [Grant],
    target: &AclTarget,
    required: &Permission,
) -> Option<&'a Grant> {
    grants.iter().find(|g| {
        g.user_id == user_id && g.target.covers(target) && g.permission.implies(required)
    })
}

/// Pure ACL decision.
///
/// A user is granted `required` on `target` when one of their grants on that
/// exact object, or a class-level grant on its resource type, carries a
/// permission that implies `required`.
///
/// - No IO
/// - No panics
pub fn is_granted(user_id: UserId, grants: &[Grant], target: &AclTarget, required: &Permission) -> bool {
    satisfying_grant(user_id, grants, target, required).is_some()
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of an ACL decision.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub user_id: UserId,
    pub target: AclTarget,
    pub required_permission: String,
    pub granted: bool,
    pub reason: String,
    /// Permissions the user holds that apply to the target (sorted).
    pub held_permissions: Vec<String>,
    pub denial_reason: Option<DenialReason>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DenialReason {
    pub kind: DenialKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    /// The user holds nothing on the target or its class.
    NoGrants,
    /// The user holds grants, but none implies the required permission.
    InsufficientPermission,
}

/// Explain why an ACL decision was made (or would be made).
pub fn explain_authorization(
    user_id: UserId,
    grants: &[Grant],
    target: &AclTarget,
    required: &Permission,
) -> AuthorizationExplanation {
    let mut held: Vec<String> = grants
        .iter()
        .filter(|g| g.user_id == user_id && g.target.covers(target))
        .map(|g| g.permission.as_str().to_string())
        .collect();
    held.sort();
    held.dedup();

    if let Some(grant) = satisfying_grant(user_id, grants, target, required) {
        let scope = match grant.target {
            AclTarget::Class { .. } => "class-level",
            AclTarget::Object { .. } => "object-level",
        };
        return AuthorizationExplanation {
            user_id,
            target: target.clone(),
            required_permission: required.to_string(),
            granted: true,
            reason: format!(
                "{scope} grant '{}' on {} implies '{}'",
                grant.permission, grant.target, required
            ),
            held_permissions: held,
            denial_reason: None,
        };
    }

    let denial = if held.is_empty() {
        DenialReason {
            kind: DenialKind::NoGrants,
            message: format!("user {user_id} holds no grants on {target}"),
        }
    } else {
        DenialReason {
            kind: DenialKind::InsufficientPermission,
            message: format!(
                "none of {:?} implies '{}' on {}",
                held, required, target
            ),
        }
    };

    AuthorizationExplanation {
        user_id,
        target: target.clone(),
        required_permission: required.to_string(),
        granted: false,
        reason: denial.message.clone(),
        held_permissions: held,
        denial_reason: Some(denial),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn grant(user: i64, target: AclTarget, perm: Permission) -> Grant {
        Grant {
            user_id: UserId::new(user),
            target,
            permission: perm,
            granted_at: Utc::now(),
        }
    }

    #[test]
    fn owner_grant_satisfies_admin_check_on_same_object() {
        let grants = vec![grant(1, AclTarget::object("post", 10), Permission::OWNER)];
        assert!(is_granted(
            UserId::new(1),
            &grants,
            &AclTarget::object("post", 10),
            &Permission::ADMIN
        ));
        assert!(!is_granted(
            UserId::new(1),
            &grants,
            &AclTarget::object("post", 11),
            &Permission::ADMIN
        ));
    }

    #[test]
    fn grants_of_other_users_are_ignored() {
        let grants = vec![grant(1, AclTarget::object("post", 10), Permission::OWNER)];
        assert!(!is_granted(
            UserId::new(2),
            &grants,
            &AclTarget::object("post", 10),
            &Permission::VIEWER
        ));
    }

    #[test]
    fn class_grant_opens_every_object_of_the_type() {
        let grants = vec![grant(3, AclTarget::class("post"), Permission::ADMIN)];
        for id in [1, 2, 99] {
            assert!(is_granted(
                UserId::new(3),
                &grants,
                &AclTarget::object("post", id),
                &Permission::ADMIN
            ));
        }
        assert!(!is_granted(
            UserId::new(3),
            &grants,
            &AclTarget::object("comment", 1),
            &Permission::ADMIN
        ));
    }

    #[test]
    fn explanation_distinguishes_no_grants_from_insufficient_ones() {
        let target = AclTarget::object("post", 1);
        let none = explain_authorization(UserId::new(1), &[], &target, &Permission::ADMIN);
        assert!(!none.granted);
        assert_eq!(none.denial_reason.unwrap().kind, DenialKind::NoGrants);

        let grants = vec![grant(1, target.clone(), Permission::VIEWER)];
        let weak = explain_authorization(UserId::new(1), &grants, &target, &Permission::ADMIN);
        assert_eq!(weak.held_permissions, vec!["viewer".to_string()]);
        assert_eq!(
            weak.denial_reason.unwrap().kind,
            DenialKind::InsufficientPermission
        );

        let grants = vec![grant(1, AclTarget::class("post"), Permission::OWNER)];
        let ok = explain_authorization(UserId::new(1), &grants, &target, &Permission::ADMIN);
        assert!(ok.granted);
        assert!(ok.reason.starts_with("class-level"));
    }
}
