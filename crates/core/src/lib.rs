//! `postguard-core`: identifiers and the domain error shared by every crate.

pub mod error;
pub mod id;

pub use error::DomainError;
pub use id::{CommentId, PostId, RoleId, UserId};
