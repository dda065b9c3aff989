//! Friendship state machine endpoints.

use axum::extract::State;
use serde_json::json;

use super::extract::Path;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::models::Envelope;
use crate::state::SharedState;
use crate::urls::{absolutize_friend, absolutize_friend_request, BaseUrl};

pub async fn send_request(
    State(state): State<SharedState>,
    user: AuthUser,
    Path(target): Path<i64>,
) -> Result<Envelope, ApiError> {
    if target == user.user_id {
        return Err(ApiError::Validation(
            "You cannot send a friend request to yourself".to_string(),
        ));
    }
    if !state.db.user_exists(target).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }
    if state
        .db
        .friendship_between(user.user_id, target)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(
            "A friendship or request already exists".to_string(),
        ));
    }

    state.db.create_friend_request(user.user_id, target).await?;
    Ok(Envelope::message("Friend request sent"))
}

pub async fn accept(
    State(state): State<SharedState>,
    user: AuthUser,
    Path(requester): Path<i64>,
) -> Result<Envelope, ApiError> {
    if !state
        .db
        .accept_friend_request(user.user_id, requester)
        .await?
    {
        return Err(ApiError::NotFound("Friend request not found".to_string()));
    }
    Ok(Envelope::message("Friend request accepted"))
}

pub async fn decline(
    State(state): State<SharedState>,
    user: AuthUser,
    Path(requester): Path<i64>,
) -> Result<Envelope, ApiError> {
    if !state
        .db
        .decline_friend_request(user.user_id, requester)
        .await?
    {
        return Err(ApiError::NotFound("Friend request not found".to_string()));
    }
    Ok(Envelope::message("Friend request declined"))
}

pub async fn remove(
    State(state): State<SharedState>,
    user: AuthUser,
    Path(friend): Path<i64>,
) -> Result<Envelope, ApiError> {
    state.db.remove_friend(user.user_id, friend).await?;
    Ok(Envelope::message("Friend removed"))
}

pub async fn block(
    State(state): State<SharedState>,
    user: AuthUser,
    Path(target): Path<i64>,
) -> Result<Envelope, ApiError> {
    if target == user.user_id {
        return Err(ApiError::Validation("You cannot block yourself".to_string()));
    }
    if !state.db.user_exists(target).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }
    state.db.block_user(user.user_id, target).await?;
    Ok(Envelope::message("User blocked"))
}

pub async fn list(
    State(state): State<SharedState>,
    BaseUrl(base): BaseUrl,
    user: AuthUser,
) -> Result<Envelope, ApiError> {
    let mut friends = state.db.list_friends(user.user_id).await?;
    for friend in &mut friends {
        absolutize_friend(&base, friend);
    }
    Ok(Envelope::data(json!({ "friends": friends })))
}

pub async fn requests(
    State(state): State<SharedState>,
    BaseUrl(base): BaseUrl,
    user: AuthUser,
) -> Result<Envelope, ApiError> {
    let mut requests = state.db.list_friend_requests(user.user_id).await?;
    for request in &mut requests {
        absolutize_friend_request(&base, request);
    }
    Ok(Envelope::data(json!({ "requests": requests })))
}
