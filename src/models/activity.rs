use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Kinds of actions recorded in a user's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    PostCreated,
    CommentCreated,
    CommentDeleted,
}

impl ActivityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityKind::PostCreated => "post_created",
            ActivityKind::CommentCreated => "comment_created",
            ActivityKind::CommentDeleted => "comment_deleted",
        }
    }
}

/// Represents the 'activities' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: i64,
    pub user_id: i64,
    pub kind: String, // see ActivityKind::as_str
    pub details: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// One flattened `details` leaf, e.g. `comment.parent_id = 4`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailRow {
    pub key: String,
    pub value: String,
}

/// History item as returned to the client, with `details` flattened.
#[derive(Debug, Serialize)]
pub struct ActivityResponse {
    pub id: i64,
    pub kind: String,
    pub details: Vec<DetailRow>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
