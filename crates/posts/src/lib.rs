//! `postguard-posts`: posts, comments and their plain-text/HTML renderings.

pub mod comment;
pub mod post;

pub use comment::{Comment, NewComment, render_comments};
pub use post::{NewPost, Post};
