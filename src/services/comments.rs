//! Posting comments and replies.

use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        activity::ActivityKind,
        comment::{CommentNode, CreateCommentRequest, NewComment},
    },
    services::{activity, mention::extract_mention, tree::build_tree},
    store::Store,
    utils::jwt::Principal,
};

/// Validates and stores a comment on `post_id` on behalf of `principal`.
///
/// A reply that opens with `@<parent author>` has that mention moved into
/// `tagged_username`.
pub async fn create_comment<S>(
    store: &S,
    principal: &Principal,
    post_id: i64,
    request: CreateCommentRequest,
) -> Result<i64, AppError>
where
    S: Store + ?Sized,
{
    request.validate()?;

    store
        .find_post(post_id)
        .await?
        .ok_or(AppError::NotFound("Post not found".to_string()))?;

    let reply_to = match request.parent_id {
        Some(parent_id) => Some(
            store
                .find_comment(post_id, parent_id)
                .await?
                .ok_or(AppError::NotFound("Parent comment not found".to_string()))?
                .username,
        ),
        None => None,
    };

    let composed = extract_mention(&request.content, reply_to.as_deref());
    if composed.content.trim().is_empty() {
        return Err(AppError::BadRequest("Comment must not be empty".to_string()));
    }

    let comment_id = store
        .create_comment(
            post_id,
            NewComment {
                user_id: principal.user_id,
                username: principal.username.clone(),
                content: composed.content,
                tagged_username: composed.tagged_username,
                parent_id: request.parent_id,
            },
        )
        .await
        .map_err(|e| {
            tracing::error!("Failed to create comment: {}", e);
            e
        })?;

    tracing::info!(post_id, comment_id, user_id = principal.user_id, "Comment created");
    activity::record(
        store,
        principal.user_id,
        ActivityKind::CommentCreated,
        json!({
            "post_id": post_id,
            "comment_id": comment_id,
            "parent_id": request.parent_id,
        }),
    )
    .await;

    Ok(comment_id)
}

/// Current thread of `post_id`, ready to render.
pub async fn comment_thread<S>(
    store: &S,
    post_id: i64,
    max_reply_depth: usize,
) -> Result<Vec<CommentNode>, AppError>
where
    S: Store + ?Sized,
{
    store
        .find_post(post_id)
        .await?
        .ok_or(AppError::NotFound("Post not found".to_string()))?;

    let records = store.list_comments(post_id).await?;
    Ok(build_tree(&records, max_reply_depth)?)
}
