//! Notification read API.

use axum::extract::State;
use serde_json::json;

use super::extract::{Path, Query};
use super::Pagination;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::models::Envelope;
use crate::state::SharedState;
use crate::urls::{absolutize_notification, BaseUrl};

pub async fn list(
    State(state): State<SharedState>,
    BaseUrl(base): BaseUrl,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> Result<Envelope, ApiError> {
    let (_, limit, offset) = pagination.resolve(20);
    let (mut notifications, unread_count, has_more) = state
        .db
        .list_notifications(user.user_id, limit, offset)
        .await?;
    for notification in &mut notifications {
        absolutize_notification(&base, notification);
    }
    Ok(Envelope::data(json!({
        "notifications": notifications,
        "unreadCount": unread_count,
        "hasMore": has_more,
    })))
}

pub async fn mark_read(
    State(state): State<SharedState>,
    user: AuthUser,
    Path(reference): Path<String>,
) -> Result<Envelope, ApiError> {
    state
        .db
        .mark_notification_read(user.user_id, &reference)
        .await?;
    Ok(Envelope::message("Notification marked as read"))
}

pub async fn mark_all_read(
    State(state): State<SharedState>,
    user: AuthUser,
) -> Result<Envelope, ApiError> {
    state.db.mark_all_notifications_read(user.user_id).await?;
    Ok(Envelope::message("All notifications marked as read"))
}

pub async fn remove(
    State(state): State<SharedState>,
    user: AuthUser,
    Path(reference): Path<String>,
) -> Result<Envelope, ApiError> {
    state.db.delete_notification(user.user_id, &reference).await?;
    Ok(Envelope::message("Notification deleted"))
}
