//! Comment database queries.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::CommentStore;
use crate::db::{StoreResult, bounded};
use crate::models::blog::Comment;

const COMMENT_COLUMNS: &str = "id, blog_id, user_id, parent_id, content, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PgCommentStore {
    pool: PgPool,
}

impl PgCommentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommentStore for PgCommentStore {
    async fn insert(&self, comment: Comment) -> StoreResult<Comment> {
        let sql = format!(
            "INSERT INTO comments (id, blog_id, user_id, parent_id, content, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $6) RETURNING {COMMENT_COLUMNS}"
        );
        bounded(
            sqlx::query_as::<_, Comment>(&sql)
                .bind(comment.id)
                .bind(comment.blog_id)
                .bind(comment.user_id)
                .bind(comment.parent_id)
                .bind(&comment.content)
                .bind(comment.created_at)
                .fetch_one(&self.pool),
        )
        .await
    }

    async fn find(&self, id: Uuid) -> StoreResult<Option<Comment>> {
        let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1");
        bounded(
            sqlx::query_as::<_, Comment>(&sql)
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn list_for_blog(&self, blog_id: Uuid) -> StoreResult<Vec<Comment>> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE blog_id = $1 ORDER BY created_at, id"
        );
        bounded(
            sqlx::query_as::<_, Comment>(&sql)
                .bind(blog_id)
                .fetch_all(&self.pool),
        )
        .await
    }

    async fn update_content(&self, id: Uuid, content: &str) -> StoreResult<Option<Comment>> {
        let sql = format!(
            "UPDATE comments SET content = $2, updated_at = now() WHERE id = $1 \
             RETURNING {COMMENT_COLUMNS}"
        );
        bounded(
            sqlx::query_as::<_, Comment>(&sql)
                .bind(id)
                .bind(content)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn delete_subtree(&self, id: Uuid) -> StoreResult<u64> {
        let result = bounded(
            sqlx::query(
                "WITH RECURSIVE subtree AS ( \
                     SELECT id FROM comments WHERE id = $1 \
                     UNION ALL \
                     SELECT c.id FROM comments c JOIN subtree s ON c.parent_id = s.id \
                 ) \
                 DELETE FROM comments WHERE id IN (SELECT id FROM subtree)",
            )
            .bind(id)
            .execute(&self.pool),
        )
        .await?;
        Ok(result.rows_affected())
    }
}
