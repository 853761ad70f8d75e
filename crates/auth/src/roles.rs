use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use postguard_core::RoleId;

/// Role identifier used for account-level RBAC (`admin`, `editor`, ...).
///
/// Roles are opaque names at this layer. They are distinct from ACL
/// permissions, which are attached to individual objects or classes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A persisted role row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub id: RoleId,
    pub name: Role,
    pub description: Option<String>,
}
