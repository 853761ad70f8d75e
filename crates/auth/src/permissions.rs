use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// ACL permission identifier.
///
/// Permissions are opaque strings attached to grants. The built-in names form
/// a ladder where a higher rung implies every lower one:
///
/// `owner` ⊇ `admin` ⊇ `editor` ⊇ `viewer`
///
/// The wildcard `"*"` implies every permission. Any other name implies only
/// itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const OWNER: Permission = Permission(Cow::Borrowed("owner"));
    pub const ADMIN: Permission = Permission(Cow::Borrowed("admin"));
    pub const EDITOR: Permission = Permission(Cow::Borrowed("editor"));
    pub const VIEWER: Permission = Permission(Cow::Borrowed("viewer"));
    pub const WILDCARD: Permission = Permission(Cow::Borrowed("*"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }

    fn rank(&self) -> Option<u8> {
        match self.as_str() {
            "viewer" => Some(1),
            "editor" => Some(2),
            "admin" => Some(3),
            "owner" => Some(4),
            _ => None,
        }
    }

    /// Whether holding `self` is enough to satisfy a check for `required`.
    pub fn implies(&self, required: &Permission) -> bool {
        if self.is_wildcard() || self == required {
            return true;
        }
        match (self.rank(), required.rank()) {
            (Some(held), Some(needed)) => held >= needed,
            _ => false,
        }
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn owner_implies_admin_but_not_the_reverse() {
        assert!(Permission::OWNER.implies(&Permission::ADMIN));
        assert!(!Permission::ADMIN.implies(&Permission::OWNER));
    }

    #[test]
    fn custom_permissions_only_imply_themselves() {
        let publish = Permission::new("publish");
        assert!(publish.implies(&Permission::new("publish")));
        assert!(!publish.implies(&Permission::VIEWER));
        assert!(!Permission::OWNER.implies(&publish));
        assert!(Permission::WILDCARD.implies(&publish));
    }

    fn any_permission() -> impl Strategy<Value = Permission> {
        prop_oneof![
            Just(Permission::OWNER),
            Just(Permission::ADMIN),
            Just(Permission::EDITOR),
            Just(Permission::VIEWER),
            Just(Permission::WILDCARD),
            "[a-z]{1,8}".prop_map(|s: String| Permission::new(s)),
        ]
    }

    proptest! {
        #[test]
        fn implies_is_reflexive(p in any_permission()) {
            prop_assert!(p.implies(&p));
        }

        #[test]
        fn implies_is_transitive(a in any_permission(), b in any_permission(), c in any_permission()) {
            if a.implies(&b) && b.implies(&c) {
                prop_assert!(a.implies(&c));
            }
        }
    }
}
