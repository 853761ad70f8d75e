use serde::{Deserialize, Serialize};

use postguard_auth::AclResource;
use postguard_core::{DomainError, PostId, UserId};

const MAX_BODY_LEN: usize = 255;

/// A post authored by exactly one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub body: String,
    pub author_id: UserId,
}

impl AclResource for Post {
    const RESOURCE_TYPE: &'static str = "post";
    type Id = PostId;

    fn acl_object_id(&self) -> i64 {
        self.id.get()
    }
}

/// Input for creating a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub body: String,
    pub author_id: UserId,
}

impl NewPost {
    pub fn new(author_id: UserId, body: impl Into<String>) -> Result<Self, DomainError> {
        let body = body.into();
        if body.len() > MAX_BODY_LEN {
            return Err(DomainError::validation(format!(
                "post body exceeds {MAX_BODY_LEN} bytes"
            )));
        }
        Ok(Self { body, author_id })
    }

    /// The default body for a post created by `email`.
    ///
    /// Generated bodies skip the length check applied to free-form text, so
    /// any account with a valid email can create its post.
    pub fn authored_by(author_id: UserId, email: &str) -> Self {
        Self {
            body: format!("{email} post content"),
            author_id,
        }
    }
}
