// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, community, interaction, profile},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, posts, comments, profile).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (store + config).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let require_auth = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let post_routes = Router::new()
        .route("/", get(community::list_posts))
        .route("/{id}", get(community::get_post))
        .route("/{id}/comments", get(interaction::list_comments))
        .route("/{id}/comments/stream", get(interaction::stream_comments))
        // Protected post routes
        .merge(
            Router::new()
                .route("/", post(community::create_post))
                .route("/{id}", delete(community::delete_post))
                .route("/{id}/comments", post(interaction::create_comment))
                .route(
                    "/{id}/comments/{comment_id}",
                    delete(interaction::delete_comment),
                )
                .layer(require_auth.clone()),
        );

    let me_routes = Router::new()
        .route("/activity", get(profile::list_my_activity))
        .layer(require_auth);

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/posts", post_routes)
        .nest("/api/me", me_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
