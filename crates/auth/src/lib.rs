//! `postguard-auth`: pure authentication/authorization boundary.
//!
//! Users, roles, ACL permissions and grants, token claims and password
//! hashing. This crate is intentionally decoupled from HTTP and storage.

pub mod acl;
pub mod authorize;
pub mod claims;
pub mod password;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod user;

pub use acl::{AclResource, AclTarget, Grant};
pub use authorize::{explain_authorization, is_granted};
pub use claims::{Hs256JwtValidator, JwtClaims, JwtValidator, TokenValidationError, validate_claims};
pub use password::{PasswordError, PasswordHasher, PasswordScheme};
pub use permissions::Permission;
pub use principal::Principal;
pub use roles::{Role, RoleRecord};
pub use user::{LoginTracking, NewUser, User};
