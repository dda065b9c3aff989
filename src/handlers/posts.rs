//! Post creation, feed, likes, saves and comments.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use super::extract::{Json, Multipart, Path, Query};
use super::{bad_multipart, Pagination};
use crate::auth::{AuthUser, MaybeAuthUser};
use crate::error::ApiError;
use crate::models::{AddCommentRequest, Envelope};
use crate::state::SharedState;
use crate::uploads::{MediaCategory, MediaType};
use crate::urls::{absolutize_comment, absolutize_post, BaseUrl};
use crate::validation::validate_non_empty;

const PRIVACY_LEVELS: &[&str] = &["public", "friends", "private"];

pub async fn create(
    State(state): State<SharedState>,
    user: AuthUser,
    Multipart(mut multipart): Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut content: Option<String> = None;
    let mut privacy = "public".to_string();
    let mut media: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "content" => content = Some(field.text().await.map_err(bad_multipart)?),
            "privacy" => privacy = field.text().await.map_err(bad_multipart)?,
            "postMedia" => {
                let content_type = field.content_type().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(bad_multipart)?;
                media = Some((content_type, data.to_vec()));
            }
            _ => {}
        }
    }

    let content = content
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());
    if content.is_none() && media.is_none() {
        return Err(ApiError::Validation(
            "A post needs content or media".to_string(),
        ));
    }
    if !PRIVACY_LEVELS.contains(&privacy.as_str()) {
        return Err(ApiError::Validation("Invalid privacy level".to_string()));
    }

    let mut image_url = None;
    let mut video_url = None;
    if let Some((content_type, data)) = media {
        if data.len() as u64 > state.media.max_bytes() {
            return Err(ApiError::Validation("File is too large".to_string()));
        }
        let stored = state
            .media
            .store(MediaCategory::Posts, &content_type, &data)
            .await
            .map_err(|err| ApiError::Validation(err.to_string()))?;
        match stored.media_type {
            MediaType::Image => image_url = Some(stored.url_path),
            MediaType::Video => video_url = Some(stored.url_path),
        }
    }

    let (post_id, uuid) = state
        .db
        .create_post(
            user.user_id,
            content.as_deref(),
            image_url.as_deref(),
            video_url.as_deref(),
            &privacy,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Envelope::message_data("Post created", json!({ "postId": post_id, "uuid": uuid })),
    ))
}

pub async fn feed(
    State(state): State<SharedState>,
    BaseUrl(base): BaseUrl,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> Result<Envelope, ApiError> {
    let (page, limit, offset) = pagination.resolve(20);
    let (mut posts, has_more) = state.db.feed(user.user_id, limit, offset).await?;
    for post in &mut posts {
        absolutize_post(&base, post);
    }
    Ok(Envelope::data(
        json!({ "posts": posts, "page": page, "hasMore": has_more }),
    ))
}

pub async fn single(
    State(state): State<SharedState>,
    BaseUrl(base): BaseUrl,
    viewer: MaybeAuthUser,
    Path(reference): Path<String>,
) -> Result<Envelope, ApiError> {
    let Some(mut post) = state.db.get_post(&reference, viewer.user_id()).await? else {
        return Err(ApiError::NotFound("Post not found".to_string()));
    };
    absolutize_post(&base, &mut post);
    Ok(Envelope::data(json!({ "post": post })))
}

pub async fn user_posts(
    State(state): State<SharedState>,
    BaseUrl(base): BaseUrl,
    viewer: MaybeAuthUser,
    Path(username): Path<String>,
    Query(pagination): Query<Pagination>,
) -> Result<Envelope, ApiError> {
    let (page, limit, offset) = pagination.resolve(20);
    let (mut posts, has_more) = state
        .db
        .user_posts(&username, viewer.user_id(), limit, offset)
        .await?;
    for post in &mut posts {
        absolutize_post(&base, post);
    }
    Ok(Envelope::data(
        json!({ "posts": posts, "page": page, "hasMore": has_more }),
    ))
}

pub async fn toggle_like(
    State(state): State<SharedState>,
    user: AuthUser,
    Path(reference): Path<String>,
) -> Result<Envelope, ApiError> {
    let Some(is_liked) = state.db.toggle_like(user.user_id, &reference).await? else {
        return Err(ApiError::NotFound("Post not found".to_string()));
    };
    let message = if is_liked { "Post liked" } else { "Like removed" };
    Ok(Envelope::message_data(message, json!({ "isLiked": is_liked })))
}

pub async fn toggle_save(
    State(state): State<SharedState>,
    user: AuthUser,
    Path(reference): Path<String>,
) -> Result<Envelope, ApiError> {
    let Some(is_saved) = state.db.toggle_save(user.user_id, &reference).await? else {
        return Err(ApiError::NotFound("Post not found".to_string()));
    };
    let message = if is_saved { "Post saved" } else { "Post unsaved" };
    Ok(Envelope::message_data(message, json!({ "isSaved": is_saved })))
}

pub async fn add_comment(
    State(state): State<SharedState>,
    user: AuthUser,
    Path(reference): Path<String>,
    Json(req): Json<AddCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = req.content.trim();
    validate_non_empty(content, "Comment content").map_err(ApiError::Validation)?;

    let Some((comment_id, uuid)) = state
        .db
        .add_comment(user.user_id, &reference, content, req.parent_comment_id)
        .await?
    else {
        return Err(ApiError::NotFound("Post not found".to_string()));
    };

    Ok((
        StatusCode::CREATED,
        Envelope::message_data(
            "Comment added",
            json!({ "commentId": comment_id, "uuid": uuid }),
        ),
    ))
}

pub async fn comments(
    State(state): State<SharedState>,
    BaseUrl(base): BaseUrl,
    viewer: MaybeAuthUser,
    Path(reference): Path<String>,
) -> Result<Envelope, ApiError> {
    let mut comments = state.db.comments(&reference, viewer.user_id()).await?;
    for comment in &mut comments {
        absolutize_comment(&base, comment);
    }
    Ok(Envelope::data(json!({ "comments": comments })))
}

pub async fn remove(
    State(state): State<SharedState>,
    user: AuthUser,
    Path(reference): Path<String>,
) -> Result<Envelope, ApiError> {
    if !state.db.delete_post(user.user_id, &reference).await? {
        return Err(ApiError::NotFound("Post not found".to_string()));
    }
    Ok(Envelope::message("Post deleted"))
}
