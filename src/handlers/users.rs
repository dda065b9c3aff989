//! Profiles, profile editing, avatar and cover uploads, user search.

use axum::extract::State;
use serde_json::json;

use super::bad_multipart;
use super::extract::{Json, Multipart, Path};
use crate::auth::{AuthUser, MaybeAuthUser};
use crate::error::ApiError;
use crate::models::{Envelope, UpdateProfileRequest};
use crate::state::SharedState;
use crate::uploads::{MediaCategory, MediaType};
use crate::urls::{absolutize_profile, absolutize_summary, to_absolute, BaseUrl};
use crate::validation::validate_non_empty;

pub async fn profile(
    State(state): State<SharedState>,
    BaseUrl(base): BaseUrl,
    viewer: MaybeAuthUser,
    Path(username): Path<String>,
) -> Result<Envelope, ApiError> {
    let Some(mut profile) = state.db.get_profile(&username).await? else {
        return Err(ApiError::NotFound("User not found".to_string()));
    };

    if let Some(viewer_id) = viewer.user_id() {
        if viewer_id == profile.id {
            profile.is_own_profile = true;
        } else {
            profile.friendship_status =
                state.db.friendship_between(viewer_id, profile.id).await?;
        }
    }

    absolutize_profile(&base, &mut profile);
    Ok(Envelope::data(json!({ "user": profile })))
}

pub async fn update_profile(
    State(state): State<SharedState>,
    user: AuthUser,
    Json(patch): Json<UpdateProfileRequest>,
) -> Result<Envelope, ApiError> {
    if let Some(full_name) = &patch.full_name {
        validate_non_empty(full_name.trim(), "Full name").map_err(ApiError::Validation)?;
    }
    state.db.update_profile(user.user_id, &patch).await?;
    Ok(Envelope::message("Profile updated"))
}

pub async fn upload_profile_picture(
    State(state): State<SharedState>,
    BaseUrl(base): BaseUrl,
    user: AuthUser,
    Multipart(multipart): Multipart,
) -> Result<Envelope, ApiError> {
    let url_path = store_picture(&state, multipart, MediaCategory::Profiles).await?;
    state.db.set_profile_picture(user.user_id, &url_path).await?;
    Ok(Envelope::message_data(
        "Profile picture updated",
        json!({ "profilePicture": to_absolute(&base, Some(url_path)) }),
    ))
}

pub async fn upload_cover_picture(
    State(state): State<SharedState>,
    BaseUrl(base): BaseUrl,
    user: AuthUser,
    Multipart(multipart): Multipart,
) -> Result<Envelope, ApiError> {
    let url_path = store_picture(&state, multipart, MediaCategory::Covers).await?;
    state.db.set_cover_picture(user.user_id, &url_path).await?;
    Ok(Envelope::message_data(
        "Cover picture updated",
        json!({ "coverPicture": to_absolute(&base, Some(url_path)) }),
    ))
}

/// Reads the first file field from the multipart body and stores it as an
/// image in the given category.
async fn store_picture(
    state: &SharedState,
    mut multipart: axum::extract::Multipart,
    category: MediaCategory,
) -> Result<String, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        if field.file_name().is_none() {
            continue;
        }
        let content_type = field.content_type().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(bad_multipart)?;

        if data.len() as u64 > state.media.max_bytes() {
            return Err(ApiError::Validation("File is too large".to_string()));
        }
        let stored = state
            .media
            .store(category, &content_type, &data)
            .await
            .map_err(|err| ApiError::Validation(err.to_string()))?;
        if stored.media_type != MediaType::Image {
            state.media.remove(&stored.url_path).await.ok();
            return Err(ApiError::Validation(
                "Only image uploads are allowed here".to_string(),
            ));
        }
        return Ok(stored.url_path);
    }
    Err(ApiError::Validation("No file uploaded".to_string()))
}

pub async fn search(
    State(state): State<SharedState>,
    BaseUrl(base): BaseUrl,
    _user: AuthUser,
    Path(query): Path<String>,
) -> Result<Envelope, ApiError> {
    let query = query.trim().to_string();
    if query.is_empty() {
        return Err(ApiError::Validation("Search query is required".to_string()));
    }

    let mut users = state.db.search_users(&query, 20).await?;
    for user in &mut users {
        absolutize_summary(&base, user);
    }
    Ok(Envelope::data(json!({ "users": users })))
}
