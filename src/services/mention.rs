//! `@username` handling for replies.

use crate::models::comment::CommentRecord;

/// Comment body split into stored content and the tagged user, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedComment {
    pub content: String,
    pub tagged_username: Option<String>,
}

/// Splits a leading `@reply_to` mention off the composed text.
///
/// The match is an exact, case-sensitive prefix. Text that does not start
/// with the mention is kept verbatim.
pub fn extract_mention(text: &str, reply_to: Option<&str>) -> ComposedComment {
    if let Some(username) = reply_to {
        let mention = format!("@{username}");
        if let Some(rest) = text.strip_prefix(mention.as_str()) {
            return ComposedComment {
                content: rest.trim().to_string(),
                tagged_username: Some(username.to_string()),
            };
        }
    }

    ComposedComment {
        content: text.to_string(),
        tagged_username: None,
    }
}

/// Text as shown to readers, with the mention put back in front.
pub fn display_content(record: &CommentRecord) -> String {
    match &record.tagged_username {
        Some(username) => format!("@{} {}", username, record.content),
        None => record.content.clone(),
    }
}
