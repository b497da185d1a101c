//! Persistence seams.
//!
//! Handlers talk to storage only through these traits. `MemoryStore` backs
//! tests and database-less runs, `PgStore` backs production.

pub mod memory;
pub mod postgres;
pub mod subscription;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::{
        activity::{ActivityEntry, ActivityKind},
        comment::{CommentRecord, NewComment},
        post::{NewPost, Post},
        user::User,
    },
};

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use subscription::{SnapshotEvent, SnapshotHub, Subscription};

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `Conflict` when the username is taken.
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, AppError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;
}

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn create_post(&self, post: NewPost) -> Result<i64, AppError>;

    /// Live posts, newest first, strictly older than `cursor` when given.
    async fn list_posts(
        &self,
        cursor: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<Post>, AppError>;

    /// Soft-deleted posts are not returned.
    async fn find_post(&self, post_id: i64) -> Result<Option<Post>, AppError>;

    async fn soft_delete_post(&self, post_id: i64) -> Result<(), AppError>;
}

/// Flat, keyed comment collection per post with change notification.
#[async_trait]
pub trait CommentStore: Send + Sync {
    /// The first `next()` on the handle yields the current snapshot,
    /// then one snapshot per later change to this post's comments.
    async fn subscribe(&self, post_id: i64) -> Result<Subscription, AppError>;

    /// Appends a comment; the store assigns `id` and `created_at`.
    async fn create_comment(&self, post_id: i64, comment: NewComment) -> Result<i64, AppError>;

    /// Removes every listed comment of the post in one write.
    async fn delete_comments(&self, post_id: i64, comment_ids: &[i64]) -> Result<(), AppError>;

    async fn delete_comment(&self, post_id: i64, comment_id: i64) -> Result<(), AppError> {
        self.delete_comments(post_id, &[comment_id]).await
    }

    async fn list_comments(&self, post_id: i64) -> Result<Vec<CommentRecord>, AppError>;

    async fn find_comment(
        &self,
        post_id: i64,
        comment_id: i64,
    ) -> Result<Option<CommentRecord>, AppError>;
}

#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn record_activity(
        &self,
        user_id: i64,
        kind: ActivityKind,
        details: serde_json::Value,
    ) -> Result<(), AppError>;

    /// Newest first.
    async fn list_activity(&self, user_id: i64) -> Result<Vec<ActivityEntry>, AppError>;
}

/// Everything the HTTP layer needs from a backend.
pub trait Store: UserStore + PostStore + CommentStore + ActivityStore {}

impl<T> Store for T where T: UserStore + PostStore + CommentStore + ActivityStore {}
