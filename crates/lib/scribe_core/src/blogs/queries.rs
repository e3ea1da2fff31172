//! Blog database queries.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{BlogStore, SEARCH_LIMIT};
use crate::db::{StoreResult, bounded};
use crate::models::blog::{Blog, BlogQuery, BlogUpdate, Reaction};
use crate::uuid::uuidv7;

const BLOG_COLUMNS: &str = "id, author_id, title, content, image_urls, tags, posted_at, \
     like_count, dislike_count, comment_count, share_count, ai_suggestion, created_at, updated_at";

fn counter_column(reaction: Reaction) -> &'static str {
    match reaction {
        Reaction::Like => "like_count",
        Reaction::Dislike => "dislike_count",
    }
}

/// Escape `%`, `_` and `\` so user input matches literally inside `ILIKE`.
pub(crate) fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[derive(Debug, Clone)]
pub struct PgBlogStore {
    pool: PgPool,
}

impl PgBlogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BlogStore for PgBlogStore {
    async fn insert(&self, blog: Blog) -> StoreResult<Blog> {
        let sql = format!(
            "INSERT INTO blogs (id, author_id, title, content, image_urls, tags, posted_at, \
             created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $7, $7) \
             RETURNING {BLOG_COLUMNS}"
        );
        bounded(
            sqlx::query_as::<_, Blog>(&sql)
                .bind(blog.id)
                .bind(blog.author_id)
                .bind(&blog.title)
                .bind(&blog.content)
                .bind(&blog.image_urls)
                .bind(&blog.tags)
                .bind(blog.posted_at)
                .fetch_one(&self.pool),
        )
        .await
    }

    async fn find(&self, id: Uuid) -> StoreResult<Option<Blog>> {
        let sql = format!("SELECT {BLOG_COLUMNS} FROM blogs WHERE id = $1");
        bounded(
            sqlx::query_as::<_, Blog>(&sql)
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn list(&self, query: &BlogQuery) -> StoreResult<(Vec<Blog>, i64)> {
        let sql = format!(
            "SELECT {BLOG_COLUMNS} FROM blogs WHERE ($1::text IS NULL OR $1 = ANY(tags)) \
             ORDER BY {}, id LIMIT $2 OFFSET $3",
            query.sort.order_by()
        );
        bounded(async {
            let items = sqlx::query_as::<_, Blog>(&sql)
                .bind(&query.tag)
                .bind(query.page_size)
                .bind(query.offset())
                .fetch_all(&self.pool)
                .await?;
            let total = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM blogs WHERE ($1::text IS NULL OR $1 = ANY(tags))",
            )
            .bind(&query.tag)
            .fetch_one(&self.pool)
            .await?;
            Ok::<_, sqlx::Error>((items, total))
        })
        .await
    }

    async fn update(&self, id: Uuid, update: &BlogUpdate) -> StoreResult<Option<Blog>> {
        let sql = format!(
            "UPDATE blogs SET title = $2, content = $3, tags = $4, updated_at = now() \
             WHERE id = $1 RETURNING {BLOG_COLUMNS}"
        );
        bounded(
            sqlx::query_as::<_, Blog>(&sql)
                .bind(id)
                .bind(&update.title)
                .bind(&update.content)
                .bind(&update.tags)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let result = bounded(
            sqlx::query("DELETE FROM blogs WHERE id = $1")
                .bind(id)
                .execute(&self.pool),
        )
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn search(&self, title: Option<&str>, author_id: Option<Uuid>) -> StoreResult<Vec<Blog>> {
        let sql = format!(
            "SELECT {BLOG_COLUMNS} FROM blogs \
             WHERE ($1::text IS NULL OR title ILIKE '%' || $1 || '%') \
               AND ($2::uuid IS NULL OR author_id = $2) \
             ORDER BY posted_at DESC, id LIMIT $3"
        );
        bounded(
            sqlx::query_as::<_, Blog>(&sql)
                .bind(title.map(escape_like))
                .bind(author_id)
                .bind(SEARCH_LIMIT)
                .fetch_all(&self.pool),
        )
        .await
    }

    async fn add_interaction(
        &self,
        user_id: Uuid,
        blog_id: Uuid,
        reaction: Reaction,
    ) -> StoreResult<bool> {
        let result = bounded(
            sqlx::query(
                "INSERT INTO blog_interactions (id, user_id, blog_id, action) \
                 VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (user_id, blog_id, action) DO NOTHING",
            )
            .bind(uuidv7())
            .bind(user_id)
            .bind(blog_id)
            .bind(reaction.as_str())
            .execute(&self.pool),
        )
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn remove_interaction(
        &self,
        user_id: Uuid,
        blog_id: Uuid,
        reaction: Reaction,
    ) -> StoreResult<()> {
        bounded(
            sqlx::query(
                "DELETE FROM blog_interactions WHERE user_id = $1 AND blog_id = $2 AND action = $3",
            )
            .bind(user_id)
            .bind(blog_id)
            .bind(reaction.as_str())
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn increment_reaction(&self, blog_id: Uuid, reaction: Reaction) -> StoreResult<bool> {
        let column = counter_column(reaction);
        let sql = format!("UPDATE blogs SET {column} = {column} + 1 WHERE id = $1");
        let result = bounded(sqlx::query(&sql).bind(blog_id).execute(&self.pool)).await?;
        Ok(result.rows_affected() == 1)
    }

    async fn adjust_comment_count(&self, blog_id: Uuid, delta: i64) -> StoreResult<()> {
        bounded(
            sqlx::query(
                "UPDATE blogs SET comment_count = GREATEST(comment_count + $2, 0) WHERE id = $1",
            )
            .bind(blog_id)
            .bind(delta)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn record_share(&self, blog_id: Uuid) -> StoreResult<bool> {
        let result = bounded(
            sqlx::query("UPDATE blogs SET share_count = share_count + 1 WHERE id = $1")
                .bind(blog_id)
                .execute(&self.pool),
        )
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn set_ai_suggestion(
        &self,
        blog_id: Uuid,
        suggestion: &str,
    ) -> StoreResult<Option<Blog>> {
        let sql = format!(
            "UPDATE blogs SET ai_suggestion = $2, updated_at = now() \
             WHERE id = $1 RETURNING {BLOG_COLUMNS}"
        );
        bounded(
            sqlx::query_as::<_, Blog>(&sql)
                .bind(blog_id)
                .bind(suggestion)
                .fetch_optional(&self.pool),
        )
        .await
    }
}
