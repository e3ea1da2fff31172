//! Threaded comments on blog posts.

pub mod queries;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::blogs::{BlogError, BlogResult, BlogStore};
use crate::db::StoreResult;
use crate::models::auth::Role;
use crate::models::blog::{Comment, CommentNode};
use crate::uuid::uuidv7;

pub const MAX_COMMENT_LEN: usize = 5000;

#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn insert(&self, comment: Comment) -> StoreResult<Comment>;

    async fn find(&self, id: Uuid) -> StoreResult<Option<Comment>>;

    /// All comments of a blog, oldest first.
    async fn list_for_blog(&self, blog_id: Uuid) -> StoreResult<Vec<Comment>>;

    async fn update_content(&self, id: Uuid, content: &str) -> StoreResult<Option<Comment>>;

    /// Delete a comment and all of its replies, returning how many went away.
    async fn delete_subtree(&self, id: Uuid) -> StoreResult<u64>;
}

fn validate_content(content: &str) -> BlogResult<()> {
    if content.is_empty() {
        return Err(BlogError::validation("content", "Comment cannot be empty"));
    }
    if content.chars().count() > MAX_COMMENT_LEN {
        return Err(BlogError::validation(
            "content",
            format!("Comment must be at most {MAX_COMMENT_LEN} characters"),
        ));
    }
    Ok(())
}

/// Nest a flat, oldest-first comment list. Comments whose parent is missing
/// are shown at the top level.
pub fn build_thread(comments: Vec<Comment>) -> Vec<CommentNode> {
    let ids: std::collections::HashSet<Uuid> = comments.iter().map(|c| c.id).collect();
    let mut children: HashMap<Option<Uuid>, Vec<Comment>> = HashMap::new();
    for comment in comments {
        let parent = comment.parent_id.filter(|p| ids.contains(p));
        children.entry(parent).or_default().push(comment);
    }
    attach(None, &mut children)
}

fn attach(parent: Option<Uuid>, children: &mut HashMap<Option<Uuid>, Vec<Comment>>) -> Vec<CommentNode> {
    let Some(level) = children.remove(&parent) else {
        return Vec::new();
    };
    level
        .into_iter()
        .map(|comment| {
            let replies = attach(Some(comment.id), children);
            CommentNode { comment, replies }
        })
        .collect()
}

#[derive(Clone)]
pub struct CommentService {
    comments: Arc<dyn CommentStore>,
    blogs: Arc<dyn BlogStore>,
}

impl CommentService {
    pub fn new(comments: Arc<dyn CommentStore>, blogs: Arc<dyn BlogStore>) -> Self {
        Self { comments, blogs }
    }

    async fn require_blog(&self, blog_id: Uuid) -> BlogResult<()> {
        self.blogs
            .find(blog_id)
            .await?
            .map(|_| ())
            .ok_or(BlogError::NotFound)
    }

    async fn require_comment(&self, id: Uuid) -> BlogResult<Comment> {
        self.comments
            .find(id)
            .await?
            .ok_or(BlogError::CommentNotFound)
    }

    pub async fn create(
        &self,
        blog_id: Uuid,
        user_id: Uuid,
        content: &str,
        parent_id: Option<Uuid>,
    ) -> BlogResult<Comment> {
        let content = content.trim();
        validate_content(content)?;
        self.require_blog(blog_id).await?;
        if let Some(parent_id) = parent_id {
            let parent = self.require_comment(parent_id).await?;
            if parent.blog_id != blog_id {
                return Err(BlogError::validation(
                    "parent_id",
                    "Parent comment belongs to a different blog",
                ));
            }
        }

        let now = Utc::now();
        let comment = self
            .comments
            .insert(Comment {
                id: uuidv7(),
                blog_id,
                user_id,
                parent_id,
                content: content.to_string(),
                created_at: now,
                updated_at: now,
            })
            .await?;
        if let Err(e) = self.blogs.adjust_comment_count(blog_id, 1).await {
            warn!(%blog_id, error = %e, "comment count not updated");
        }
        info!(comment_id = %comment.id, %blog_id, "comment created");
        Ok(comment)
    }

    pub async fn thread(&self, blog_id: Uuid) -> BlogResult<Vec<CommentNode>> {
        self.require_blog(blog_id).await?;
        Ok(build_thread(self.comments.list_for_blog(blog_id).await?))
    }

    /// Only the author may edit a comment.
    pub async fn update(&self, id: Uuid, user_id: Uuid, content: &str) -> BlogResult<Comment> {
        let content = content.trim();
        validate_content(content)?;
        let comment = self.require_comment(id).await?;
        if comment.user_id != user_id {
            return Err(BlogError::NotOwner("comments"));
        }
        self.comments
            .update_content(id, content)
            .await?
            .ok_or(BlogError::CommentNotFound)
    }

    /// The author or an admin may delete a comment; its replies go with it.
    pub async fn delete(&self, id: Uuid, user_id: Uuid, role: Role) -> BlogResult<u64> {
        let comment = self.require_comment(id).await?;
        if comment.user_id != user_id && !role.is_admin() {
            return Err(BlogError::NotOwner("comments"));
        }
        let removed = self.comments.delete_subtree(id).await?;
        if removed > 0 {
            let delta = i64::try_from(removed).unwrap_or(i64::MAX);
            if let Err(e) = self.blogs.adjust_comment_count(comment.blog_id, -delta).await {
                warn!(blog_id = %comment.blog_id, error = %e, "comment count not updated");
            }
        }
        info!(comment_id = %id, removed, "comment deleted");
        Ok(removed)
    }
}
