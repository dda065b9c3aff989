//! Ephemeral story endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::warn;

use super::bad_multipart;
use super::extract::{Multipart, Path};
use crate::auth::AuthUser;
use crate::db::now;
use crate::error::ApiError;
use crate::models::Envelope;
use crate::state::SharedState;
use crate::uploads::MediaCategory;
use crate::urls::{absolutize_story_group, absolutize_story_viewer, BaseUrl};

const STORY_TTL_SECS: i64 = 24 * 3600;

pub async fn create(
    State(state): State<SharedState>,
    user: AuthUser,
    Multipart(mut multipart): Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut caption: Option<String> = None;
    let mut media: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "caption" => caption = Some(field.text().await.map_err(bad_multipart)?),
            "storyMedia" => {
                let content_type = field.content_type().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(bad_multipart)?;
                media = Some((content_type, data.to_vec()));
            }
            _ => {}
        }
    }

    let Some((content_type, data)) = media else {
        return Err(ApiError::Validation("Story media is required".to_string()));
    };
    if data.len() as u64 > state.media.max_bytes() {
        return Err(ApiError::Validation("File is too large".to_string()));
    }

    let stored = state
        .media
        .store(MediaCategory::Stories, &content_type, &data)
        .await
        .map_err(|err| ApiError::Validation(err.to_string()))?;

    let caption = caption
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());
    let (story_id, uuid) = state
        .db
        .create_story(
            user.user_id,
            &stored.url_path,
            stored.media_type.as_str(),
            caption.as_deref(),
            now() + STORY_TTL_SECS,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Envelope::message_data("Story created", json!({ "storyId": story_id, "uuid": uuid })),
    ))
}

pub async fn feed(
    State(state): State<SharedState>,
    BaseUrl(base): BaseUrl,
    user: AuthUser,
) -> Result<Envelope, ApiError> {
    let mut groups = state.db.stories_feed(user.user_id).await?;
    for group in &mut groups {
        absolutize_story_group(&base, group);
    }
    Ok(Envelope::data(json!({ "storyGroups": groups })))
}

pub async fn view(
    State(state): State<SharedState>,
    user: AuthUser,
    Path(reference): Path<String>,
) -> Result<Envelope, ApiError> {
    if !state.db.view_story(user.user_id, &reference).await? {
        return Err(ApiError::NotFound("Story not found".to_string()));
    }
    Ok(Envelope::message("Story viewed"))
}

pub async fn viewers(
    State(state): State<SharedState>,
    BaseUrl(base): BaseUrl,
    user: AuthUser,
    Path(reference): Path<String>,
) -> Result<Envelope, ApiError> {
    let Some((story_id, owner_id)) = state.db.resolve_story(&reference).await? else {
        return Err(ApiError::NotFound("Story not found".to_string()));
    };
    if owner_id != user.user_id {
        return Err(ApiError::Forbidden(
            "Only the story owner can see viewers".to_string(),
        ));
    }

    let mut viewers = state.db.story_viewers(story_id).await?;
    for viewer in &mut viewers {
        absolutize_story_viewer(&base, viewer);
    }
    Ok(Envelope::data(json!({ "viewers": viewers })))
}

pub async fn remove(
    State(state): State<SharedState>,
    user: AuthUser,
    Path(reference): Path<String>,
) -> Result<Envelope, ApiError> {
    let Some(media_url) = state.db.delete_story(user.user_id, &reference).await? else {
        return Err(ApiError::NotFound("Story not found".to_string()));
    };
    if let Err(err) = state.media.remove(&media_url).await {
        warn!("Failed to remove story media {media_url}: {err:#}");
    }
    Ok(Envelope::message("Story deleted"))
}
