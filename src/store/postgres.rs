use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::{
    error::AppError,
    models::{
        activity::{ActivityEntry, ActivityKind},
        comment::{CommentRecord, NewComment, StoredComment},
        post::{NewPost, Post},
        user::User,
    },
};

use super::{ActivityStore, CommentStore, PostStore, SnapshotHub, Subscription, UserStore};

const CONNECT_ATTEMPTS: u32 = 5;

const SELECT_POST: &str = r#"
    SELECT p.id, p.user_id, u.username, p.title, p.content, p.created_at, p.deleted_at
    FROM posts p
    JOIN users u ON p.user_id = u.id
"#;

const SELECT_COMMENT: &str = r#"
    SELECT c.id, c.post_id, c.user_id, u.username, c.content,
           c.tagged_username, c.parent_id, c.created_at
    FROM comments c
    LEFT JOIN users u ON c.user_id = u.id
"#;

/// PostgreSQL-backed store. Change notifications cover writes made
/// through this process only.
pub struct PgStore {
    pool: PgPool,
    hub: SnapshotHub,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            hub: SnapshotHub::new(),
        }
    }

    /// Connects with retry and applies pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self, AppError> {
        let mut retry_count = 0;
        let pool = loop {
            match PgPoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Duration::from_secs(3))
                .connect(database_url)
                .await
            {
                Ok(pool) => break pool,
                Err(e) => {
                    retry_count += 1;
                    if retry_count > CONNECT_ATTEMPTS {
                        return Err(AppError::InternalServerError(format!(
                            "Failed to connect to database after {} retries: {}",
                            CONNECT_ATTEMPTS, e
                        )));
                    }
                    tracing::warn!(
                        "Database not ready, retrying in 2s... (Attempt {})",
                        retry_count
                    );
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        };
        tracing::info!("Database connected...");

        tracing::info!("Running migrations...");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| AppError::InternalServerError(format!("Migration failed: {}", e)))?;
        tracing::info!("Migrations applied successfully.");

        Ok(Self::new(pool))
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password)
            VALUES ($1, $2)
            RETURNING id, username, password, created_at
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Username '{}' already exists", username))
            } else {
                tracing::error!("Failed to register user: {:?}", e);
                AppError::from(e)
            }
        })
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }
}

#[async_trait]
impl PostStore for PgStore {
    async fn create_post(&self, post: NewPost) -> Result<i64, AppError> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO posts (user_id, title, content)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(post.user_id)
        .bind(&post.title)
        .bind(&post.content)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create post: {:?}", e);
            AppError::from(e)
        })?;
        Ok(id)
    }

    async fn list_posts(
        &self,
        cursor: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<Post>, AppError> {
        let sql = format!(
            "{SELECT_POST}
            WHERE p.deleted_at IS NULL
              AND ($1::TIMESTAMPTZ IS NULL OR p.created_at < $1)
            ORDER BY p.created_at DESC
            LIMIT $2"
        );
        let posts = sqlx::query_as::<_, Post>(&sql)
            .bind(cursor)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(posts)
    }

    async fn find_post(&self, post_id: i64) -> Result<Option<Post>, AppError> {
        let sql = format!("{SELECT_POST} WHERE p.id = $1 AND p.deleted_at IS NULL");
        let post = sqlx::query_as::<_, Post>(&sql)
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(post)
    }

    async fn soft_delete_post(&self, post_id: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE posts SET deleted_at = NOW() WHERE id = $1")
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete post: {:?}", e);
                AppError::from(e)
            })?;
        Ok(())
    }
}

#[async_trait]
impl CommentStore for PgStore {
    async fn subscribe(&self, post_id: i64) -> Result<Subscription, AppError> {
        Ok(self.hub.subscribe(post_id, self.list_comments(post_id)).await)
    }

    async fn create_comment(&self, post_id: i64, comment: NewComment) -> Result<i64, AppError> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO comments (post_id, user_id, content, tagged_username, parent_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(post_id)
        .bind(comment.user_id)
        .bind(&comment.content)
        .bind(&comment.tagged_username)
        .bind(comment.parent_id)
        .fetch_one(&self.pool)
        .await?;

        self.hub.refresh(post_id, self.list_comments(post_id)).await;
        Ok(id)
    }

    async fn delete_comments(&self, post_id: i64, comment_ids: &[i64]) -> Result<(), AppError> {
        sqlx::query("DELETE FROM comments WHERE post_id = $1 AND id = ANY($2)")
            .bind(post_id)
            .bind(comment_ids)
            .execute(&self.pool)
            .await?;

        self.hub.refresh(post_id, self.list_comments(post_id)).await;
        Ok(())
    }

    async fn list_comments(&self, post_id: i64) -> Result<Vec<CommentRecord>, AppError> {
        let sql = format!("{SELECT_COMMENT} WHERE c.post_id = $1");
        let rows = sqlx::query_as::<_, StoredComment>(&sql)
            .bind(post_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(CommentRecord::from).collect())
    }

    async fn find_comment(
        &self,
        post_id: i64,
        comment_id: i64,
    ) -> Result<Option<CommentRecord>, AppError> {
        let sql = format!("{SELECT_COMMENT} WHERE c.post_id = $1 AND c.id = $2");
        let row = sqlx::query_as::<_, StoredComment>(&sql)
            .bind(post_id)
            .bind(comment_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(CommentRecord::from))
    }
}

#[async_trait]
impl ActivityStore for PgStore {
    async fn record_activity(
        &self,
        user_id: i64,
        kind: ActivityKind,
        details: serde_json::Value,
    ) -> Result<(), AppError> {
        sqlx::query("INSERT INTO activities (user_id, kind, details) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(kind.as_str())
            .bind(details)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_activity(&self, user_id: i64) -> Result<Vec<ActivityEntry>, AppError> {
        let entries = sqlx::query_as::<_, ActivityEntry>(
            r#"
            SELECT id, user_id, kind, details, created_at
            FROM activities
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }
}
