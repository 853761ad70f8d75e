use serde::{Deserialize, Serialize};

use postguard_core::UserId;

use crate::Role;

/// A fully resolved, authenticated principal for authorization decisions.
///
/// Construction is decoupled from storage and transport: the API derives it
/// from verified token claims and a datastore lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub email: String,
    pub roles: Vec<Role>,
}

impl Principal {
    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|r| r.as_str() == name)
    }
}
