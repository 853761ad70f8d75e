//! User accounts: identity, credentials, login tracking and roles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use postguard_core::{DomainError, UserId};

use crate::{Principal, Role};

const MAX_EMAIL_LEN: usize = 255;

/// A persisted user account.
///
/// # Invariants
/// - `email` is unique across all users.
/// - Inactive users cannot authenticate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    /// Self-describing password hash (see [`crate::PasswordHasher`]).
    #[serde(skip_serializing)]
    pub password: String,
    pub last_login_at: Option<DateTime<Utc>>,
    pub current_login_at: Option<DateTime<Utc>>,
    pub last_login_ip: Option<String>,
    pub current_login_ip: Option<String>,
    pub login_count: i64,
    pub active: bool,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub roles: Vec<Role>,
}

impl User {
    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|r| r.as_str() == name)
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed_at.is_some()
    }

    pub fn principal(&self) -> Principal {
        Principal {
            user_id: self.id,
            email: self.email.clone(),
            roles: self.roles.clone(),
        }
    }

    /// Login tracking state after a successful login at `now` from `ip`.
    ///
    /// The previous "current" login becomes the "last" login.
    pub fn tracked_login(&self, now: DateTime<Utc>, ip: Option<String>) -> LoginTracking {
        LoginTracking {
            last_login_at: self.current_login_at.or(Some(now)),
            current_login_at: now,
            last_login_ip: self.current_login_ip.clone().or_else(|| ip.clone()),
            current_login_ip: ip,
            login_count: self.login_count + 1,
        }
    }
}

/// Login tracking columns written after a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginTracking {
    pub last_login_at: Option<DateTime<Utc>>,
    pub current_login_at: DateTime<Utc>,
    pub last_login_ip: Option<String>,
    pub current_login_ip: Option<String>,
    pub login_count: i64,
}

/// Input for creating a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub active: bool,
    pub roles: Vec<Role>,
}

impl NewUser {
    pub fn new(email: impl Into<String>, password_hash: impl Into<String>) -> Result<Self, DomainError> {
        let email = email.into().trim().to_string();
        if email.is_empty() || !email.contains('@') {
            return Err(DomainError::validation(format!("invalid email '{email}'")));
        }
        if email.len() > MAX_EMAIL_LEN {
            return Err(DomainError::validation("email too long"));
        }
        Ok(Self {
            email,
            password_hash: password_hash.into(),
            active: true,
            roles: Vec::new(),
        })
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.roles.extend(roles);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user() -> User {
        User {
            id: UserId::new(1),
            email: "matt@lp.com".into(),
            password: "plaintext$password".into(),
            last_login_at: None,
            current_login_at: None,
            last_login_ip: None,
            current_login_ip: None,
            login_count: 0,
            active: true,
            confirmed_at: None,
            roles: vec![Role::new("admin")],
        }
    }

    #[test]
    fn first_login_fills_both_last_and_current() {
        let now = Utc::now();
        let t = user().tracked_login(now, Some("10.0.0.1".into()));
        assert_eq!(t.last_login_at, Some(now));
        assert_eq!(t.current_login_at, now);
        assert_eq!(t.last_login_ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(t.login_count, 1);
    }

    #[test]
    fn later_login_shifts_current_into_last() {
        let first = Utc::now() - Duration::days(1);
        let mut u = user();
        u.current_login_at = Some(first);
        u.current_login_ip = Some("10.0.0.1".into());
        u.login_count = 3;

        let now = Utc::now();
        let t = u.tracked_login(now, Some("10.0.0.2".into()));
        assert_eq!(t.last_login_at, Some(first));
        assert_eq!(t.last_login_ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(t.current_login_ip.as_deref(), Some("10.0.0.2"));
        assert_eq!(t.login_count, 4);
    }

    #[test]
    fn new_user_validates_email() {
        assert!(NewUser::new("  ", "x").is_err());
        assert!(NewUser::new("not-an-email", "x").is_err());
        let u = NewUser::new(" joe@lp.com ", "x").unwrap().active(false);
        assert_eq!(u.email, "joe@lp.com");
        assert!(!u.active);
    }

    #[test]
    fn principal_carries_roles() {
        let p = user().principal();
        assert!(p.has_role("admin"));
        assert_eq!(p.email, "matt@lp.com");
    }
}
