//! SQLite-backed post and comment store.

use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};
use tracing::instrument;

use postguard_core::{CommentId, PostId, UserId};
use postguard_posts::{Comment, NewComment, NewPost, Post};

use super::PostStore;
use crate::error::{StoreError, map_sqlx_error};

#[derive(Debug, Clone)]
pub struct SqlitePostStore {
    pool: SqlitePool,
}

impl SqlitePostStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct PostRow {
    id: i64,
    body: String,
    author_id: i64,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Post {
            id: PostId::new(row.id),
            body: row.body,
            author_id: UserId::new(row.author_id),
        }
    }
}

#[derive(Debug, FromRow)]
struct CommentRow {
    id: i64,
    body: String,
    author_id: i64,
    post_id: i64,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: CommentId::new(row.id),
            body: row.body,
            author_id: UserId::new(row.author_id),
            post_id: PostId::new(row.post_id),
        }
    }
}

#[async_trait]
impl PostStore for SqlitePostStore {
    #[instrument(skip(self, new_post), fields(author_id = new_post.author_id.get()), err)]
    async fn create_post(&self, new_post: NewPost) -> Result<Post, StoreError> {
        let result = sqlx::query("INSERT INTO posts (body, author_id) VALUES (?1, ?2)")
            .bind(&new_post.body)
            .bind(new_post.author_id.get())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("create_post", e))?;

        Ok(Post {
            id: PostId::new(result.last_insert_rowid()),
            body: new_post.body,
            author_id: new_post.author_id,
        })
    }

    async fn find_post(&self, id: PostId) -> Result<Option<Post>, StoreError> {
        let row: Option<PostRow> = sqlx::query_as("SELECT id, body, author_id FROM posts WHERE id = ?1")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_post", e))?;
        Ok(row.map(Post::from))
    }

    async fn posts_by_author(&self, author_id: UserId) -> Result<Vec<Post>, StoreError> {
        let rows: Vec<PostRow> =
            sqlx::query_as("SELECT id, body, author_id FROM posts WHERE author_id = ?1 ORDER BY id")
                .bind(author_id.get())
                .fetch_all(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("posts_by_author", e))?;
        Ok(rows.into_iter().map(Post::from).collect())
    }

    #[instrument(skip(self, new_comment), fields(post_id = new_comment.post_id.get()), err)]
    async fn add_comment(&self, new_comment: NewComment) -> Result<Comment, StoreError> {
        let result = sqlx::query("INSERT INTO comments (body, author_id, post_id) VALUES (?1, ?2, ?3)")
            .bind(&new_comment.body)
            .bind(new_comment.author_id.get())
            .bind(new_comment.post_id.get())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("add_comment", e))?;

        Ok(Comment {
            id: CommentId::new(result.last_insert_rowid()),
            body: new_comment.body,
            author_id: new_comment.author_id,
            post_id: new_comment.post_id,
        })
    }

    async fn comments_for(&self, post_id: PostId) -> Result<Vec<Comment>, StoreError> {
        let rows: Vec<CommentRow> = sqlx::query_as(
            "SELECT id, body, author_id, post_id FROM comments WHERE post_id = ?1 ORDER BY id",
        )
        .bind(post_id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("comments_for", e))?;
        Ok(rows.into_iter().map(Comment::from).collect())
    }
}
