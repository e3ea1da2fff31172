//! Blog posts: CRUD, listing, search and reactions.

pub mod queries;

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::ErrorKind;
use crate::auth::directory::UserDirectory;
use crate::db::{StoreError, StoreResult};
use crate::images::{ImageError, ImageStore, MAX_IMAGES_PER_POST, UploadedImage};
use crate::models::auth::Role;
use crate::models::blog::{Blog, BlogQuery, BlogSort, BlogUpdate, NewBlog, Page, Reaction};
use crate::uuid::uuidv7;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;
/// Highest page number honoured; larger requests read as this page.
pub const MAX_PAGE: i64 = i64::MAX / MAX_PAGE_SIZE;
const MAX_TITLE_LEN: usize = 200;
const MAX_TAGS: usize = 20;
/// Upper bound on search hits returned in one response.
pub const SEARCH_LIMIT: i64 = 100;

/// Errors from blog and comment operations.
#[derive(Debug, Error)]
pub enum BlogError {
    #[error("Blog not found")]
    NotFound,

    #[error("Comment not found")]
    CommentNotFound,

    #[error("You can only modify your own {0}")]
    NotOwner(&'static str),

    #[error("You have already {0}d this blog")]
    AlreadyReacted(Reaction),

    #[error("{message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Image(#[from] ImageError),
}

impl BlogError {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        BlogError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BlogError::NotFound | BlogError::CommentNotFound => ErrorKind::NotFound,
            BlogError::NotOwner(_) => ErrorKind::Forbidden,
            BlogError::AlreadyReacted(_) | BlogError::Store(StoreError::Conflict(_)) => {
                ErrorKind::Conflict
            }
            BlogError::Validation { .. } => ErrorKind::Validation,
            BlogError::Store(_) => ErrorKind::Transient,
            BlogError::Image(e) => e.kind(),
        }
    }
}

pub type BlogResult<T> = std::result::Result<T, BlogError>;

/// Persistence for blogs and their reactions.
#[async_trait]
pub trait BlogStore: Send + Sync {
    async fn insert(&self, blog: Blog) -> StoreResult<Blog>;

    async fn find(&self, id: Uuid) -> StoreResult<Option<Blog>>;

    /// One page of blogs plus the total matching the query's filter.
    async fn list(&self, query: &BlogQuery) -> StoreResult<(Vec<Blog>, i64)>;

    async fn update(&self, id: Uuid, update: &BlogUpdate) -> StoreResult<Option<Blog>>;

    async fn delete(&self, id: Uuid) -> StoreResult<bool>;

    /// Case-insensitive title substring and/or exact author, newest first.
    async fn search(&self, title: Option<&str>, author_id: Option<Uuid>) -> StoreResult<Vec<Blog>>;

    /// Record `(user, blog, reaction)` if absent. Returns whether a new
    /// record was written; concurrent duplicates collapse to one.
    async fn add_interaction(&self, user_id: Uuid, blog_id: Uuid, reaction: Reaction)
    -> StoreResult<bool>;

    async fn remove_interaction(
        &self,
        user_id: Uuid,
        blog_id: Uuid,
        reaction: Reaction,
    ) -> StoreResult<()>;

    /// Bump the counter matching `reaction`. Returns `false` if the blog is gone.
    async fn increment_reaction(&self, blog_id: Uuid, reaction: Reaction) -> StoreResult<bool>;

    async fn adjust_comment_count(&self, blog_id: Uuid, delta: i64) -> StoreResult<()>;

    /// Bump the share counter. Returns `false` if the blog is gone.
    async fn record_share(&self, blog_id: Uuid) -> StoreResult<bool>;

    /// Replace the stored AI suggestion, returning the updated blog.
    async fn set_ai_suggestion(&self, blog_id: Uuid, suggestion: &str)
    -> StoreResult<Option<Blog>>;
}

/// Listing query with defaults applied and the page size clamped.
pub fn list_query(
    page: Option<i64>,
    page_size: Option<i64>,
    sort: BlogSort,
    tag: Option<String>,
) -> BlogQuery {
    BlogQuery {
        page: page.filter(|p| *p >= 1).unwrap_or(1).min(MAX_PAGE),
        page_size: page_size
            .filter(|s| *s >= 1)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE),
        sort,
        tag: tag
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty()),
    }
}

/// Trim, lowercase and dedupe tags, dropping empty ones.
fn normalize_tags(tags: &[String]) -> BlogResult<Vec<String>> {
    let tags: BTreeSet<String> = tags
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    if tags.len() > MAX_TAGS {
        return Err(BlogError::validation("tags", format!("At most {MAX_TAGS} tags")));
    }
    Ok(tags.into_iter().collect())
}

fn validate_post(title: &str, content: &str) -> BlogResult<()> {
    if title.is_empty() {
        return Err(BlogError::validation("title", "Title is required"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(BlogError::validation(
            "title",
            format!("Title must be at most {MAX_TITLE_LEN} characters"),
        ));
    }
    if content.is_empty() {
        return Err(BlogError::validation("content", "Content is required"));
    }
    Ok(())
}

#[derive(Clone)]
pub struct BlogService {
    blogs: Arc<dyn BlogStore>,
    users: Arc<dyn UserDirectory>,
    images: Arc<dyn ImageStore>,
}

impl BlogService {
    pub fn new(
        blogs: Arc<dyn BlogStore>,
        users: Arc<dyn UserDirectory>,
        images: Arc<dyn ImageStore>,
    ) -> Self {
        Self {
            blogs,
            users,
            images,
        }
    }

    pub async fn create(&self, author_id: Uuid, new: NewBlog) -> BlogResult<Blog> {
        self.create_with_images(author_id, new, Vec::new()).await
    }

    /// Create a post, storing `uploads` first and recording their paths after
    /// any given image URLs. Stored files are removed again if the post cannot
    /// be written.
    pub async fn create_with_images(
        &self,
        author_id: Uuid,
        new: NewBlog,
        uploads: Vec<UploadedImage>,
    ) -> BlogResult<Blog> {
        let title = new.title.trim().to_string();
        let content = new.content.trim().to_string();
        validate_post(&title, &content)?;
        let tags = normalize_tags(&new.tags)?;
        if uploads.len() > MAX_IMAGES_PER_POST {
            return Err(ImageError::TooMany.into());
        }
        let mut image_urls: Vec<String> = new
            .image_urls
            .into_iter()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .collect();

        let stored = self.store_images(&uploads).await?;
        image_urls.extend(stored.iter().cloned());

        let now = Utc::now();
        let inserted = self
            .blogs
            .insert(Blog {
                id: uuidv7(),
                author_id,
                title,
                content,
                image_urls,
                tags,
                posted_at: now,
                like_count: 0,
                dislike_count: 0,
                comment_count: 0,
                share_count: 0,
                ai_suggestion: None,
                created_at: now,
                updated_at: now,
            })
            .await;
        let blog = match inserted {
            Ok(blog) => blog,
            Err(e) => {
                self.discard_images(&stored).await;
                return Err(e.into());
            }
        };
        info!(blog_id = %blog.id, author_id = %author_id, images = stored.len(), "blog created");
        Ok(blog)
    }

    /// Save every upload or none of them.
    async fn store_images(&self, uploads: &[UploadedImage]) -> BlogResult<Vec<String>> {
        let mut stored = Vec::with_capacity(uploads.len());
        for upload in uploads {
            match self.images.save(upload).await {
                Ok(path) => stored.push(path),
                Err(e) => {
                    self.discard_images(&stored).await;
                    return Err(e.into());
                }
            }
        }
        Ok(stored)
    }

    async fn discard_images(&self, paths: &[String]) {
        for path in paths {
            if let Err(e) = self.images.remove(path).await {
                warn!(%path, error = %e, "could not remove orphaned image");
            }
        }
    }

    pub async fn list(&self, query: &BlogQuery) -> BlogResult<Page<Blog>> {
        let (items, total) = self.blogs.list(query).await?;
        Ok(Page {
            items,
            total,
            page: query.page,
            page_size: query.page_size,
        })
    }

    pub async fn get(&self, id: Uuid) -> BlogResult<Blog> {
        self.blogs.find(id).await?.ok_or(BlogError::NotFound)
    }

    /// Load a post and require that `author_id` wrote it.
    pub async fn owned(&self, id: Uuid, author_id: Uuid) -> BlogResult<Blog> {
        let blog = self.get(id).await?;
        if blog.author_id != author_id {
            return Err(BlogError::NotOwner("blogs"));
        }
        Ok(blog)
    }

    /// Only the author may edit a post.
    pub async fn update(&self, id: Uuid, author_id: Uuid, update: BlogUpdate) -> BlogResult<Blog> {
        self.owned(id, author_id).await?;
        let update = BlogUpdate {
            title: update.title.trim().to_string(),
            content: update.content.trim().to_string(),
            tags: normalize_tags(&update.tags)?,
        };
        validate_post(&update.title, &update.content)?;
        self.blogs
            .update(id, &update)
            .await?
            .ok_or(BlogError::NotFound)
    }

    /// The author or any admin may delete a post.
    pub async fn delete(&self, id: Uuid, actor_id: Uuid, actor_role: Role) -> BlogResult<()> {
        let blog = self.get(id).await?;
        if blog.author_id != actor_id && !actor_role.is_admin() {
            return Err(BlogError::NotOwner("blogs"));
        }
        if !self.blogs.delete(id).await? {
            return Err(BlogError::NotFound);
        }
        self.discard_images(&blog.image_urls).await;
        info!(blog_id = %id, actor_id = %actor_id, "blog deleted");
        Ok(())
    }

    /// Search by title fragment and/or author username. An unknown author
    /// matches nothing.
    pub async fn search(&self, title: Option<&str>, author: Option<&str>) -> BlogResult<Vec<Blog>> {
        let title = title.map(str::trim).filter(|t| !t.is_empty());
        let author = author.map(str::trim).filter(|a| !a.is_empty());
        if title.is_none() && author.is_none() {
            return Err(BlogError::validation(
                "query",
                "Provide a title or an author to search for",
            ));
        }

        let author_id = match author {
            Some(username) => match self.users.find_by_username(username).await? {
                Some(user) => Some(user.id),
                None => return Ok(Vec::new()),
            },
            None => None,
        };
        Ok(self.blogs.search(title, author_id).await?)
    }

    /// Count a share. Shares are not tied to a user and may repeat.
    pub async fn share(&self, blog_id: Uuid) -> BlogResult<Blog> {
        if !self.blogs.record_share(blog_id).await? {
            return Err(BlogError::NotFound);
        }
        self.get(blog_id).await
    }

    /// Keep an AI suggestion on the author's post.
    pub async fn save_suggestion(
        &self,
        blog_id: Uuid,
        author_id: Uuid,
        suggestion: &str,
    ) -> BlogResult<Blog> {
        self.owned(blog_id, author_id).await?;
        self.blogs
            .set_ai_suggestion(blog_id, suggestion)
            .await?
            .ok_or(BlogError::NotFound)
    }

    pub async fn like(&self, blog_id: Uuid, user_id: Uuid) -> BlogResult<Blog> {
        self.react(blog_id, user_id, Reaction::Like).await
    }

    pub async fn dislike(&self, blog_id: Uuid, user_id: Uuid) -> BlogResult<Blog> {
        self.react(blog_id, user_id, Reaction::Dislike).await
    }

    async fn react(&self, blog_id: Uuid, user_id: Uuid, reaction: Reaction) -> BlogResult<Blog> {
        self.get(blog_id).await?;
        if !self.blogs.add_interaction(user_id, blog_id, reaction).await? {
            return Err(BlogError::AlreadyReacted(reaction));
        }

        let bumped = self.blogs.increment_reaction(blog_id, reaction).await;
        if !matches!(bumped, Ok(true)) {
            if let Err(e) = self.blogs.remove_interaction(user_id, blog_id, reaction).await {
                warn!(%blog_id, %user_id, %reaction, error = %e, "could not undo interaction");
            }
            bumped?;
            return Err(BlogError::NotFound);
        }
        self.get(blog_id).await
    }
}
