use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::RwLock;

use crate::{
    error::AppError,
    models::{
        activity::{ActivityEntry, ActivityKind},
        comment::{CommentRecord, NewComment},
        post::{NewPost, Post},
        user::User,
    },
};

use super::{ActivityStore, CommentStore, PostStore, SnapshotHub, Subscription, UserStore};

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    last_timestamp: Option<DateTime<Utc>>,
    users: Vec<User>,
    posts: Vec<Post>,
    comments: Vec<CommentRecord>,
    activities: Vec<ActivityEntry>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Wall-clock time, nudged forward so that no two writes share a timestamp.
    fn now(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_timestamp {
            if now <= last {
                now = last + TimeDelta::microseconds(1);
            }
        }
        self.last_timestamp = Some(now);
        now
    }
}

/// Process-local store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    hub: SnapshotHub,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a comment exactly as given, bypassing id and timestamp assignment.
    /// Used to load fixtures and to reproduce damaged data.
    pub async fn insert_raw_comment(&self, record: CommentRecord) {
        let post_id = record.post_id;
        {
            let mut state = self.state.write().await;
            state.next_id = state.next_id.max(record.id);
            state.comments.push(record);
        }
        self.hub.refresh(post_id, self.list_comments(post_id)).await;
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, AppError> {
        let mut state = self.state.write().await;
        if state.users.iter().any(|u| u.username == username) {
            return Err(AppError::Conflict(format!(
                "Username '{}' already exists",
                username
            )));
        }

        let user = User {
            id: state.next_id(),
            username: username.to_string(),
            password: password_hash.to_string(),
            created_at: state.now(),
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| u.username == username).cloned())
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn create_post(&self, post: NewPost) -> Result<i64, AppError> {
        let mut state = self.state.write().await;
        let id = state.next_id();
        let created_at = state.now();
        state.posts.push(Post {
            id,
            user_id: post.user_id,
            username: post.username,
            title: post.title,
            content: post.content,
            created_at,
            deleted_at: None,
        });
        Ok(id)
    }

    async fn list_posts(
        &self,
        cursor: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<Post>, AppError> {
        let state = self.state.read().await;
        let mut posts: Vec<Post> = state
            .posts
            .iter()
            .filter(|p| p.deleted_at.is_none())
            .filter(|p| cursor.is_none_or(|c| p.created_at < c))
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        posts.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(posts)
    }

    async fn find_post(&self, post_id: i64) -> Result<Option<Post>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .posts
            .iter()
            .find(|p| p.id == post_id && p.deleted_at.is_none())
            .cloned())
    }

    async fn soft_delete_post(&self, post_id: i64) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        let now = state.now();
        if let Some(post) = state.posts.iter_mut().find(|p| p.id == post_id) {
            post.deleted_at = Some(now);
        }
        Ok(())
    }
}

#[async_trait]
impl CommentStore for MemoryStore {
    async fn subscribe(&self, post_id: i64) -> Result<Subscription, AppError> {
        Ok(self.hub.subscribe(post_id, self.list_comments(post_id)).await)
    }

    async fn create_comment(&self, post_id: i64, comment: NewComment) -> Result<i64, AppError> {
        let id = {
            let mut state = self.state.write().await;
            let id = state.next_id();
            let created_at = state.now();
            state.comments.push(CommentRecord {
                id,
                post_id,
                user_id: comment.user_id,
                username: comment.username,
                content: comment.content,
                tagged_username: comment.tagged_username,
                parent_id: comment.parent_id,
                created_at,
            });
            id
        };

        self.hub.refresh(post_id, self.list_comments(post_id)).await;
        Ok(id)
    }

    async fn delete_comments(&self, post_id: i64, comment_ids: &[i64]) -> Result<(), AppError> {
        {
            let mut state = self.state.write().await;
            state
                .comments
                .retain(|c| c.post_id != post_id || !comment_ids.contains(&c.id));
        }

        self.hub.refresh(post_id, self.list_comments(post_id)).await;
        Ok(())
    }

    async fn list_comments(&self, post_id: i64) -> Result<Vec<CommentRecord>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn find_comment(
        &self,
        post_id: i64,
        comment_id: i64,
    ) -> Result<Option<CommentRecord>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .comments
            .iter()
            .find(|c| c.post_id == post_id && c.id == comment_id)
            .cloned())
    }
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn record_activity(
        &self,
        user_id: i64,
        kind: ActivityKind,
        details: serde_json::Value,
    ) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        let id = state.next_id();
        let created_at = state.now();
        state.activities.push(ActivityEntry {
            id,
            user_id,
            kind: kind.as_str().to_string(),
            details,
            created_at,
        });
        Ok(())
    }

    async fn list_activity(&self, user_id: i64) -> Result<Vec<ActivityEntry>, AppError> {
        let state = self.state.read().await;
        let mut entries: Vec<ActivityEntry> = state
            .activities
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }
}
