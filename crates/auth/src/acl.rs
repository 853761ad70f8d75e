//! Object-level and class-level grant model.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use postguard_core::UserId;

use crate::Permission;

/// A type whose instances can carry ACL grants.
pub trait AclResource {
    /// Stable resource type name stored alongside grants (e.g. `"post"`).
    const RESOURCE_TYPE: &'static str;

    /// Typed identifier. Raw ids from routes are parsed through it.
    type Id: FromStr + Into<i64>;

    /// Identifier of this instance within its resource type.
    fn acl_object_id(&self) -> i64;

    fn acl_target(&self) -> AclTarget {
        AclTarget::object(Self::RESOURCE_TYPE, self.acl_object_id())
    }

    fn acl_class() -> AclTarget
    where
        Self: Sized,
    {
        AclTarget::class(Self::RESOURCE_TYPE)
    }

    /// Parse a raw object id the same way the resource's `Id` does.
    fn parse_object_id(raw: &str) -> Option<i64>
    where
        Self: Sized,
    {
        raw.parse::<Self::Id>().ok().map(Into::into)
    }
}

/// What a grant applies to: one object, or every object of a resource type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum AclTarget {
    Object { resource_type: String, object_id: i64 },
    Class { resource_type: String },
}

impl AclTarget {
    pub fn object(resource_type: impl Into<String>, object_id: i64) -> Self {
        Self::Object {
            resource_type: resource_type.into(),
            object_id,
        }
    }

    pub fn class(resource_type: impl Into<String>) -> Self {
        Self::Class {
            resource_type: resource_type.into(),
        }
    }

    pub fn resource_type(&self) -> &str {
        match self {
            Self::Object { resource_type, .. } | Self::Class { resource_type } => resource_type,
        }
    }

    pub fn object_id(&self) -> Option<i64> {
        match self {
            Self::Object { object_id, .. } => Some(*object_id),
            Self::Class { .. } => None,
        }
    }

    /// Whether a grant on `self` applies to `other`.
    ///
    /// A class target covers itself and every object of the same type; an
    /// object target covers only that object.
    pub fn covers(&self, other: &AclTarget) -> bool {
        match self {
            Self::Class { resource_type } => resource_type == other.resource_type(),
            Self::Object { .. } => self == other,
        }
    }
}

impl core::fmt::Display for AclTarget {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Object {
                resource_type,
                object_id,
            } => write!(f, "{resource_type}:{object_id}"),
            Self::Class { resource_type } => write!(f, "{resource_type}:*"),
        }
    }
}

/// A single permission held by a user on a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub user_id: UserId,
    pub target: AclTarget,
    pub permission: Permission,
    pub granted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_target_covers_objects_of_same_type() {
        let class = AclTarget::class("post");
        assert!(class.covers(&AclTarget::object("post", 7)));
        assert!(class.covers(&AclTarget::class("post")));
        assert!(!class.covers(&AclTarget::object("comment", 7)));
    }

    #[test]
    fn object_target_covers_only_itself() {
        let obj = AclTarget::object("post", 1);
        assert!(obj.covers(&AclTarget::object("post", 1)));
        assert!(!obj.covers(&AclTarget::object("post", 2)));
        assert!(!obj.covers(&AclTarget::class("post")));
    }

    #[test]
    fn display_marks_class_targets_with_star() {
        assert_eq!(AclTarget::object("post", 3).to_string(), "post:3");
        assert_eq!(AclTarget::class("post").to_string(), "post:*");
    }
}
