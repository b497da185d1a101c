use std::sync::Arc;

use axum::{Extension, Json, extract::State, response::IntoResponse};

use crate::{
    error::AppError,
    models::activity::ActivityResponse,
    store::Store,
    utils::jwt::{Claims, Principal},
};

/// List the current user's activity history, newest first.
/// Nested details are flattened into `key`/`value` rows.
pub async fn list_my_activity(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let principal = Principal::try_from(&claims)?;

    let history: Vec<ActivityResponse> = store
        .list_activity(principal.user_id)
        .await?
        .into_iter()
        .map(ActivityResponse::from)
        .collect();

    Ok(Json(history))
}
