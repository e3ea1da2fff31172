use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::blogs::{BlogStore, SEARCH_LIMIT};
use crate::comments::CommentStore;
use crate::db::StoreResult;
use crate::models::blog::{Blog, BlogQuery, BlogSort, BlogUpdate, Comment, Reaction};

/// Ordering matching [`BlogSort::order_by`], with ids breaking ties.
fn compare(sort: BlogSort, a: &Blog, b: &Blog) -> Ordering {
    let recent = (b.posted_at, b.id).cmp(&(a.posted_at, a.id));
    match sort {
        BlogSort::Recent => recent,
        BlogSort::Oldest => recent.reverse(),
        BlogSort::Popular => b.like_count.cmp(&a.like_count).then(recent),
        BlogSort::Discussed => b.comment_count.cmp(&a.comment_count).then(recent),
        BlogSort::Shared => b.share_count.cmp(&a.share_count).then(recent),
    }
}

#[derive(Debug, Default)]
pub struct MemoryBlogStore {
    blogs: RwLock<HashMap<Uuid, Blog>>,
    interactions: RwLock<HashSet<(Uuid, Uuid, Reaction)>>,
}

#[async_trait]
impl BlogStore for MemoryBlogStore {
    async fn insert(&self, blog: Blog) -> StoreResult<Blog> {
        self.blogs.write().await.insert(blog.id, blog.clone());
        Ok(blog)
    }

    async fn find(&self, id: Uuid) -> StoreResult<Option<Blog>> {
        Ok(self.blogs.read().await.get(&id).cloned())
    }

    async fn list(&self, query: &BlogQuery) -> StoreResult<(Vec<Blog>, i64)> {
        let blogs = self.blogs.read().await;
        let mut matching: Vec<&Blog> = blogs
            .values()
            .filter(|b| query.tag.as_ref().is_none_or(|t| b.tags.contains(t)))
            .collect();
        matching.sort_by(|a, b| compare(query.sort, a, b));
        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(usize::try_from(query.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(query.page_size).unwrap_or(0))
            .cloned()
            .collect();
        Ok((items, total))
    }

    async fn update(&self, id: Uuid, update: &BlogUpdate) -> StoreResult<Option<Blog>> {
        let mut blogs = self.blogs.write().await;
        Ok(blogs.get_mut(&id).map(|b| {
            b.title = update.title.clone();
            b.content = update.content.clone();
            b.tags = update.tags.clone();
            b.updated_at = Utc::now();
            b.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let removed = self.blogs.write().await.remove(&id).is_some();
        if removed {
            self.interactions
                .write()
                .await
                .retain(|(_, blog, _)| *blog != id);
        }
        Ok(removed)
    }

    async fn search(&self, title: Option<&str>, author_id: Option<Uuid>) -> StoreResult<Vec<Blog>> {
        let needle = title.map(str::to_lowercase);
        let blogs = self.blogs.read().await;
        let mut hits: Vec<Blog> = blogs
            .values()
            .filter(|b| {
                needle
                    .as_deref()
                    .is_none_or(|n| b.title.to_lowercase().contains(n))
                    && author_id.is_none_or(|a| b.author_id == a)
            })
            .cloned()
            .collect();
        hits.sort_by(|a, b| compare(BlogSort::Recent, a, b));
        hits.truncate(usize::try_from(SEARCH_LIMIT).unwrap_or(usize::MAX));
        Ok(hits)
    }

    async fn add_interaction(
        &self,
        user_id: Uuid,
        blog_id: Uuid,
        reaction: Reaction,
    ) -> StoreResult<bool> {
        Ok(self
            .interactions
            .write()
            .await
            .insert((user_id, blog_id, reaction)))
    }

    async fn remove_interaction(
        &self,
        user_id: Uuid,
        blog_id: Uuid,
        reaction: Reaction,
    ) -> StoreResult<()> {
        self.interactions
            .write()
            .await
            .remove(&(user_id, blog_id, reaction));
        Ok(())
    }

    async fn increment_reaction(&self, blog_id: Uuid, reaction: Reaction) -> StoreResult<bool> {
        let mut blogs = self.blogs.write().await;
        let Some(blog) = blogs.get_mut(&blog_id) else {
            return Ok(false);
        };
        match reaction {
            Reaction::Like => blog.like_count += 1,
            Reaction::Dislike => blog.dislike_count += 1,
        }
        Ok(true)
    }

    async fn adjust_comment_count(&self, blog_id: Uuid, delta: i64) -> StoreResult<()> {
        if let Some(blog) = self.blogs.write().await.get_mut(&blog_id) {
            blog.comment_count = (blog.comment_count + delta).max(0);
        }
        Ok(())
    }

    async fn record_share(&self, blog_id: Uuid) -> StoreResult<bool> {
        Ok(self
            .blogs
            .write()
            .await
            .get_mut(&blog_id)
            .map(|b| b.share_count += 1)
            .is_some())
    }

    async fn set_ai_suggestion(
        &self,
        blog_id: Uuid,
        suggestion: &str,
    ) -> StoreResult<Option<Blog>> {
        let mut blogs = self.blogs.write().await;
        Ok(blogs.get_mut(&blog_id).map(|b| {
            b.ai_suggestion = Some(suggestion.to_string());
            b.updated_at = Utc::now();
            b.clone()
        }))
    }
}

#[derive(Debug, Default)]
pub struct MemoryCommentStore {
    comments: RwLock<HashMap<Uuid, Comment>>,
}

#[async_trait]
impl CommentStore for MemoryCommentStore {
    async fn insert(&self, comment: Comment) -> StoreResult<Comment> {
        self.comments
            .write()
            .await
            .insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn find(&self, id: Uuid) -> StoreResult<Option<Comment>> {
        Ok(self.comments.read().await.get(&id).cloned())
    }

    async fn list_for_blog(&self, blog_id: Uuid) -> StoreResult<Vec<Comment>> {
        let comments = self.comments.read().await;
        let mut found: Vec<Comment> = comments
            .values()
            .filter(|c| c.blog_id == blog_id)
            .cloned()
            .collect();
        found.sort_by_key(|c| (c.created_at, c.id));
        Ok(found)
    }

    async fn update_content(&self, id: Uuid, content: &str) -> StoreResult<Option<Comment>> {
        let mut comments = self.comments.write().await;
        Ok(comments.get_mut(&id).map(|c| {
            c.content = content.to_string();
            c.updated_at = Utc::now();
            c.clone()
        }))
    }

    async fn delete_subtree(&self, id: Uuid) -> StoreResult<u64> {
        let mut comments = self.comments.write().await;
        if !comments.contains_key(&id) {
            return Ok(0);
        }
        let mut doomed = vec![id];
        let mut cursor = 0;
        while cursor < doomed.len() {
            let parent = doomed[cursor];
            doomed.extend(
                comments
                    .values()
                    .filter(|c| c.parent_id == Some(parent))
                    .map(|c| c.id),
            );
            cursor += 1;
        }
        for id in &doomed {
            comments.remove(id);
        }
        Ok(doomed.len() as u64)
    }
}
