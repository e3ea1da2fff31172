//! Blog, comment and interaction models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stored blog post.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Blog {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub content: String,
    pub image_urls: Vec<String>,
    pub tags: Vec<String>,
    pub posted_at: DateTime<Utc>,
    pub like_count: i64,
    pub dislike_count: i64,
    pub comment_count: i64,
    pub share_count: i64,
    pub ai_suggestion: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for a new blog post.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewBlog {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Editable blog fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlogUpdate {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Sort orders accepted by the listing endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlogSort {
    #[default]
    Recent,
    Oldest,
    Popular,
    Discussed,
    Shared,
}

impl BlogSort {
    /// `ORDER BY` clause for this sort order.
    pub fn order_by(self) -> &'static str {
        match self {
            BlogSort::Recent => "posted_at DESC",
            BlogSort::Oldest => "posted_at ASC",
            BlogSort::Popular => "like_count DESC, posted_at DESC",
            BlogSort::Discussed => "comment_count DESC, posted_at DESC",
            BlogSort::Shared => "share_count DESC, posted_at DESC",
        }
    }
}

impl FromStr for BlogSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "recent" => Ok(BlogSort::Recent),
            "oldest" => Ok(BlogSort::Oldest),
            "popular" => Ok(BlogSort::Popular),
            "discussed" => Ok(BlogSort::Discussed),
            "shared" => Ok(BlogSort::Shared),
            other => Err(format!("unknown sort order: {other}")),
        }
    }
}

/// Listing query after defaults have been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlogQuery {
    pub page: i64,
    pub page_size: i64,
    pub sort: BlogSort,
    pub tag: Option<String>,
}

impl BlogQuery {
    /// Rows to skip. Saturates rather than overflowing for absurd pages.
    pub fn offset(&self) -> i64 {
        (self.page - 1).max(0).saturating_mul(self.page_size.max(0))
    }
}

/// One page of results.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

/// Reaction a user can leave on a blog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reaction {
    Like,
    Dislike,
}

impl Reaction {
    pub fn as_str(self) -> &'static str {
        match self {
            Reaction::Like => "like",
            Reaction::Dislike => "dislike",
        }
    }
}

impl fmt::Display for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored comment.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub blog_id: Uuid,
    pub user_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A comment with its nested replies.
#[derive(Debug, Clone, Serialize)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<CommentNode>,
}
