use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::{services::mention::display_content, utils::html::escape_text};

/// Shown in place of a comment body that the store returned without one.
pub const MISSING_CONTENT_PLACEHOLDER: &str = "[comment unavailable]";
/// Shown in place of an author name that could not be resolved.
pub const UNKNOWN_USERNAME: &str = "Unknown user";

/// A single stored comment or reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub username: String,
    /// Body with any leading `@mention` of the replied-to user stripped.
    pub content: String,
    pub tagged_username: Option<String>,
    /// The comment this one replies to. `None` for top-level comments.
    pub parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Row shape as read from storage, before defaults are applied.
#[derive(Debug, Clone, FromRow)]
pub struct StoredComment {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub username: Option<String>,
    pub content: Option<String>,
    pub tagged_username: Option<String>,
    pub parent_id: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<StoredComment> for CommentRecord {
    fn from(row: StoredComment) -> Self {
        Self {
            id: row.id,
            post_id: row.post_id,
            user_id: row.user_id,
            username: row
                .username
                .unwrap_or_else(|| UNKNOWN_USERNAME.to_string()),
            content: row
                .content
                .unwrap_or_else(|| MISSING_CONTENT_PLACEHOLDER.to_string()),
            tagged_username: row.tagged_username,
            parent_id: row.parent_id,
            created_at: row.created_at.unwrap_or_default(),
        }
    }
}

/// Everything the caller supplies when appending a comment.
/// The store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub user_id: i64,
    pub username: String,
    pub content: String,
    pub tagged_username: Option<String>,
    pub parent_id: Option<i64>,
}

/// Render-ready comment plus its flattened replies.
///
/// Replies of a top-level node never carry replies of their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentNode {
    #[serde(flatten)]
    pub record: CommentRecord,
    /// `content` with the `@mention` restored, ready to print.
    pub display_content: String,
    /// `display_content` escaped for embedding in HTML.
    pub display_html: String,
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    pub fn new(record: CommentRecord) -> Self {
        let display_content = display_content(&record);
        Self {
            display_html: escape_text(&display_content),
            display_content,
            record,
            replies: Vec::new(),
        }
    }
}

/// DTO for creating a new comment.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(
        length(
            min = 1,
            max = 1000,
            message = "Comment must be between 1 and 1000 characters"
        ),
        custom(function = validate_not_blank)
    )]
    pub content: String,

    /// Optional: the ID of the comment being replied to.
    pub parent_id: Option<i64>,
}

fn validate_not_blank(content: &str) -> Result<(), validator::ValidationError> {
    if content.trim().is_empty() {
        let mut err = validator::ValidationError::new("blank_comment");
        err.message = Some("Comment must not be empty".into());
        return Err(err);
    }
    Ok(())
}
