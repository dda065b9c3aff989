//! Media URL helpers.
//!
//! Media paths are stored site-relative (`/uploads/...`) so the database
//! stays host-agnostic; responses absolutize them against the requesting
//! host. Values that are already absolute pass through unchanged.

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use crate::models::{
    AccountView, CommentView, ConversationView, FriendRequestView, FriendView, MessageView,
    NotificationView, PostView, ProfileView, StoryGroup, StoryViewerView, UserSummary,
};

/// Base URL of the incoming request, e.g. `http://localhost:3000`.
#[derive(Debug, Clone)]
pub struct BaseUrl(pub String);

#[axum::async_trait]
impl<S> FromRequestParts<S> for BaseUrl
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let scheme = parts
            .headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("http");
        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("localhost:3000");
        Ok(BaseUrl(format!("{scheme}://{host}")))
    }
}

/// Absolutizes a stored media path against `base`. `None` stays `None`.
pub fn to_absolute(base: &str, path: Option<String>) -> Option<String> {
    let path = path?;
    if path.starts_with("http://") || path.starts_with("https://") {
        return Some(path);
    }
    let separator = if path.starts_with('/') { "" } else { "/" };
    Some(format!("{base}{separator}{path}"))
}

pub fn absolutize_account(base: &str, account: &mut AccountView) {
    account.profile_picture = to_absolute(base, account.profile_picture.take());
}

pub fn absolutize_summary(base: &str, user: &mut UserSummary) {
    user.profile_picture = to_absolute(base, user.profile_picture.take());
}

pub fn absolutize_profile(base: &str, profile: &mut ProfileView) {
    profile.profile_picture = to_absolute(base, profile.profile_picture.take());
    profile.cover_picture = to_absolute(base, profile.cover_picture.take());
}

pub fn absolutize_post(base: &str, post: &mut PostView) {
    post.image_url = to_absolute(base, post.image_url.take());
    post.video_url = to_absolute(base, post.video_url.take());
    post.profile_picture = to_absolute(base, post.profile_picture.take());
}

pub fn absolutize_comment(base: &str, comment: &mut CommentView) {
    comment.profile_picture = to_absolute(base, comment.profile_picture.take());
}

pub fn absolutize_friend(base: &str, friend: &mut FriendView) {
    friend.profile_picture = to_absolute(base, friend.profile_picture.take());
}

pub fn absolutize_friend_request(base: &str, request: &mut FriendRequestView) {
    request.profile_picture = to_absolute(base, request.profile_picture.take());
}

pub fn absolutize_message(base: &str, message: &mut MessageView) {
    message.profile_picture = to_absolute(base, message.profile_picture.take());
}

pub fn absolutize_conversation(base: &str, conversation: &mut ConversationView) {
    conversation.profile_picture = to_absolute(base, conversation.profile_picture.take());
}

pub fn absolutize_notification(base: &str, notification: &mut NotificationView) {
    if let Some(actor) = notification.actor.as_mut() {
        absolutize_summary(base, actor);
    }
}

pub fn absolutize_story_group(base: &str, group: &mut StoryGroup) {
    absolutize_summary(base, &mut group.user);
    for story in &mut group.stories {
        if let Some(url) = to_absolute(base, Some(story.media_url.clone())) {
            story.media_url = url;
        }
    }
}

pub fn absolutize_story_viewer(base: &str, viewer: &mut StoryViewerView) {
    viewer.profile_picture = to_absolute(base, viewer.profile_picture.take());
}
