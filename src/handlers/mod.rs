//! HTTP surface: route table, shared request helpers and the platform
//! endpoints (health check, 404 fallback).

pub mod auth;
pub(crate) mod extract;
pub mod friends;
pub mod messages;
pub mod notifications;
pub mod posts;
pub mod stories;
pub mod users;

use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::Router;
use serde::Deserialize;
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::models::Envelope;
use crate::state::SharedState;

/// Page-based pagination query parameters, 1-based.
#[derive(Debug, Deserialize)]
pub(crate) struct Pagination {
    page: Option<i64>,
    limit: Option<i64>,
}

impl Pagination {
    /// Resolves to (page, limit, offset). Limits are clamped to 1..=100
    /// and the offset saturates so absurd page numbers cannot overflow.
    pub(crate) fn resolve(&self, default_limit: i64) -> (i64, i64, i64) {
        let limit = self.limit.unwrap_or(default_limit).clamp(1, 100);
        let page = self.page.unwrap_or(1).max(1);
        (page, limit, (page - 1).saturating_mul(limit))
    }
}

pub(crate) fn bad_multipart(err: MultipartError) -> ApiError {
    ApiError::Validation(format!("Invalid multipart body: {err}"))
}

pub fn router(state: SharedState) -> Router {
    let api = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/verify", get(auth::verify))
        .route("/auth/change-password", put(auth::change_password))
        .route("/users/search/:query", get(users::search))
        .route("/users/profile", put(users::update_profile))
        .route("/users/profile-picture", post(users::upload_profile_picture))
        .route("/users/cover-picture", post(users::upload_cover_picture))
        .route("/users/:username", get(users::profile))
        .route("/posts", post(posts::create))
        .route("/posts/feed", get(posts::feed))
        .route("/posts/user/:username", get(posts::user_posts))
        .route("/posts/:post", get(posts::single).delete(posts::remove))
        .route("/posts/:post/like", post(posts::toggle_like))
        .route("/posts/:post/save", post(posts::toggle_save))
        .route(
            "/posts/:post/comments",
            get(posts::comments).post(posts::add_comment),
        )
        .route("/friends", get(friends::list))
        .route("/friends/requests", get(friends::requests))
        .route("/friends/request/:user_id", post(friends::send_request))
        .route("/friends/accept/:user_id", put(friends::accept))
        .route("/friends/decline/:user_id", put(friends::decline))
        .route("/friends/block/:user_id", post(friends::block))
        .route("/friends/:user_id", delete(friends::remove))
        .route("/messages/conversations", get(messages::conversations))
        .route(
            "/messages/:reference",
            post(messages::send)
                .get(messages::thread)
                .delete(messages::remove),
        )
        .route("/notifications", get(notifications::list))
        .route("/notifications/read-all", put(notifications::mark_all_read))
        .route(
            "/notifications/:notification/read",
            put(notifications::mark_read),
        )
        .route(
            "/notifications/:notification",
            delete(notifications::remove),
        )
        .route("/stories", post(stories::create))
        .route("/stories/feed", get(stories::feed))
        .route("/stories/:story/view", post(stories::view))
        .route("/stories/:story/views", get(stories::viewers))
        .route("/stories/:story", delete(stories::remove))
        .route("/health", get(health));

    let upload_dir = state.config.upload_dir.clone();
    Router::new()
        .nest("/api", api)
        .nest_service("/uploads", ServeDir::new(upload_dir))
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(
                    state.config.max_upload_bytes as usize + 64 * 1024,
                )),
        )
        .with_state(state)
}

async fn health(State(state): State<SharedState>) -> Envelope {
    Envelope::data(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptimeSecs": state.uptime_secs(),
    }))
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Envelope {
            success: false,
            message: Some("Route not found".to_string()),
            data: None,
        },
    )
}
