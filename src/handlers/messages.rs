//! Direct messaging endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use super::extract::{Json, Path, Query};
use super::Pagination;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::models::{Envelope, SendMessageRequest};
use crate::state::SharedState;
use crate::urls::{absolutize_conversation, absolutize_message, BaseUrl};
use crate::validation::validate_non_empty;

pub async fn send(
    State(state): State<SharedState>,
    BaseUrl(base): BaseUrl,
    user: AuthUser,
    Path(receiver): Path<i64>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = req.content.trim();
    validate_non_empty(content, "Message content").map_err(ApiError::Validation)?;
    if !state.db.user_exists(receiver).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    let mut message = state.db.create_message(user.user_id, receiver, content).await?;
    absolutize_message(&base, &mut message);
    Ok((
        StatusCode::CREATED,
        Envelope::message_data("Message sent", json!({ "message": message })),
    ))
}

pub async fn conversations(
    State(state): State<SharedState>,
    BaseUrl(base): BaseUrl,
    user: AuthUser,
) -> Result<Envelope, ApiError> {
    let mut conversations = state.db.conversations(user.user_id).await?;
    for conversation in &mut conversations {
        absolutize_conversation(&base, conversation);
    }
    Ok(Envelope::data(json!({ "conversations": conversations })))
}

pub async fn thread(
    State(state): State<SharedState>,
    BaseUrl(base): BaseUrl,
    user: AuthUser,
    Path(peer): Path<i64>,
    Query(pagination): Query<Pagination>,
) -> Result<Envelope, ApiError> {
    let (_, limit, offset) = pagination.resolve(50);
    let (mut messages, has_more) = state.db.thread(user.user_id, peer, limit, offset).await?;
    for message in &mut messages {
        absolutize_message(&base, message);
    }
    Ok(Envelope::data(
        json!({ "messages": messages, "hasMore": has_more }),
    ))
}

pub async fn remove(
    State(state): State<SharedState>,
    user: AuthUser,
    Path(reference): Path<String>,
) -> Result<Envelope, ApiError> {
    if !state.db.delete_message(user.user_id, &reference).await? {
        return Err(ApiError::NotFound("Message not found".to_string()));
    }
    Ok(Envelope::message("Message deleted"))
}
