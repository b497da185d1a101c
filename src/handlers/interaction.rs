use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::{Stream, stream};

use crate::{
    config::Config,
    error::AppError,
    models::comment::CreateCommentRequest,
    services::{
        comments,
        feed::{CommentFeed, FeedUpdate},
        moderation,
    },
    store::Store,
    utils::jwt::{Claims, Principal},
};

/// Create a new comment or reply.
pub async fn create_comment(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<i64>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let principal = Principal::try_from(&claims)?;
    let id = comments::create_comment(&*store, &principal, post_id, payload).await?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

/// Comment thread for a post: top-level comments with flattened replies, newest first.
pub async fn list_comments(
    State(store): State<Arc<dyn Store>>,
    State(config): State<Config>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let thread = comments::comment_thread(&*store, post_id, config.max_reply_depth).await?;

    Ok(Json(thread))
}

/// Delete a comment and its direct replies.
/// Requires: Login + (Comment author OR Post author).
pub async fn delete_comment(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Path((post_id, comment_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let principal = Principal::try_from(&claims)?;
    let removed = moderation::delete_comment(&*store, &principal, post_id, comment_id).await?;

    Ok(Json(serde_json::json!({ "deleted": removed })))
}

/// Live comment thread as Server-Sent Events.
///
/// Emits `snapshot` with the full thread after every change and `error`
/// when a change could not be rendered.
pub async fn stream_comments(
    State(store): State<Arc<dyn Store>>,
    State(config): State<Config>,
    Path(post_id): Path<i64>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    store
        .find_post(post_id)
        .await?
        .ok_or(AppError::NotFound("Post not found".to_string()))?;

    let subscription = store.subscribe(post_id).await?;
    let feed = CommentFeed::new(subscription, config.max_reply_depth);

    let events = stream::unfold(feed, |mut feed| async move {
        let event = match feed.next().await? {
            FeedUpdate::Forest(forest) => match serde_json::to_string(&forest) {
                Ok(body) => Event::default().event("snapshot").data(body),
                Err(e) => {
                    tracing::error!("Failed to serialize comment thread: {:?}", e);
                    Event::default().event("error").data("Failed to render comments")
                }
            },
            FeedUpdate::Notice(msg) => Event::default().event("error").data(msg),
        };
        Some((Ok(event), feed))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
