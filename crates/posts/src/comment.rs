use serde::{Deserialize, Serialize};

use postguard_auth::AclResource;
use postguard_core::{CommentId, DomainError, PostId, UserId};

const MAX_BODY_LEN: usize = 255;

/// A comment on a post, authored by exactly one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub body: String,
    pub author_id: UserId,
    pub post_id: PostId,
}

impl AclResource for Comment {
    const RESOURCE_TYPE: &'static str = "comment";
    type Id = CommentId;

    fn acl_object_id(&self) -> i64 {
        self.id.get()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub body: String,
    pub author_id: UserId,
    pub post_id: PostId,
}

impl NewComment {
    pub fn new(post_id: PostId, author_id: UserId, body: impl Into<String>) -> Result<Self, DomainError> {
        let body = body.into();
        if body.len() > MAX_BODY_LEN {
            return Err(DomainError::validation(format!(
                "comment body exceeds {MAX_BODY_LEN} bytes"
            )));
        }
        Ok(Self {
            body,
            author_id,
            post_id,
        })
    }

    /// The default body for a comment left by `email`; exempt from the length check.
    pub fn authored_by(post_id: PostId, author_id: UserId, email: &str) -> Self {
        Self {
            body: format!("{email} comment content"),
            author_id,
            post_id,
        }
    }
}

/// Render comments as one `<div>` fragment per line.
///
/// Bodies are HTML-escaped. The Flask fixture this app reproduces
/// interpolated them raw; the output is identical for the seeded bodies.
pub fn render_comments<'a>(comments: impl IntoIterator<Item = &'a Comment>) -> String {
    comments
        .into_iter()
        .map(|c| format!("<div>{}</div>", escape_html(&c.body)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}
