use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        activity::ActivityKind,
        post::{CreatePostRequest, NewPost, PostListParams},
    },
    services::activity,
    store::Store,
    utils::{
        html::clean_html,
        jwt::{Claims, Principal},
    },
};

/// Create a new post.
/// Requires: Login.
pub async fn create_post(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let principal = Principal::try_from(&claims)?;

    let title = clean_html(&payload.title);
    let post_id = store
        .create_post(NewPost {
            user_id: principal.user_id,
            username: principal.username.clone(),
            title: title.clone(),
            content: clean_html(&payload.content),
        })
        .await?;

    activity::record(
        &*store,
        principal.user_id,
        ActivityKind::PostCreated,
        json!({ "post_id": post_id, "title": title }),
    )
    .await;

    Ok((StatusCode::CREATED, Json(json!({ "id": post_id }))))
}

/// List posts (Recent first).
/// Filter out soft-deleted posts.
/// Supports cursor-based pagination.
pub async fn list_posts(
    State(store): State<Arc<dyn Store>>,
    Query(params): Query<PostListParams>,
) -> Result<impl IntoResponse, AppError> {
    let posts = store
        .list_posts(params.cursor, params.effective_limit())
        .await?;

    Ok(Json(posts))
}

/// Get a single post by ID.
pub async fn get_post(
    State(store): State<Arc<dyn Store>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let post = store
        .find_post(id)
        .await?
        .ok_or(AppError::NotFound("Post not found".to_string()))?;

    Ok(Json(post))
}

/// Delete a post (Soft Delete).
/// Requires: Login + Author.
pub async fn delete_post(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let principal = Principal::try_from(&claims)?;

    let post = store
        .find_post(id)
        .await?
        .ok_or(AppError::NotFound("Post not found".to_string()))?;

    if post.user_id != principal.user_id {
        return Err(AppError::Forbidden(
            "You are not authorized to delete this post".to_string(),
        ));
    }

    store.soft_delete_post(id).await?;

    Ok(StatusCode::NO_CONTENT)
}
