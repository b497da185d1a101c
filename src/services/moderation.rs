//! Comment removal by its author or the post's author.

use serde_json::json;

use crate::{
    error::AppError,
    models::activity::ActivityKind,
    services::activity,
    store::Store,
    utils::jwt::Principal,
};

/// Deletes a comment together with its direct replies.
///
/// Only one level cascades: replies to those replies stay stored and, with
/// their parent gone, render as top-level comments. Returns the removed ids.
pub async fn delete_comment<S>(
    store: &S,
    principal: &Principal,
    post_id: i64,
    comment_id: i64,
) -> Result<Vec<i64>, AppError>
where
    S: Store + ?Sized,
{
    let post = store
        .find_post(post_id)
        .await?
        .ok_or(AppError::NotFound("Post not found".to_string()))?;

    let target = store
        .find_comment(post_id, comment_id)
        .await?
        .ok_or(AppError::NotFound("Comment not found".to_string()))?;

    if target.user_id != principal.user_id && post.user_id != principal.user_id {
        tracing::warn!(
            post_id,
            comment_id,
            user_id = principal.user_id,
            "Rejected comment deletion by non-author"
        );
        return Err(AppError::Forbidden(
            "You are not authorized to delete this comment".to_string(),
        ));
    }

    let mut removed = vec![target.id];
    removed.extend(
        store
            .list_comments(post_id)
            .await?
            .iter()
            .filter(|c| c.parent_id == Some(target.id))
            .map(|c| c.id),
    );

    store.delete_comments(post_id, &removed).await.map_err(|e| {
        tracing::error!("Failed to delete comment: {}", e);
        e
    })?;

    tracing::info!(post_id, comment_id, removed = removed.len(), "Comment deleted");
    activity::record(
        store,
        principal.user_id,
        ActivityKind::CommentDeleted,
        json!({
            "post_id": post_id,
            "comment_id": comment_id,
            "removed": removed,
        }),
    )
    .await;

    Ok(removed)
}
