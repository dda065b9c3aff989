//! Request and response types for the Driftwood API.
//!
//! Responses use camelCase field names and are always wrapped in the
//! uniform `{success, message?, data?}` envelope.

use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Uniform response envelope used by every endpoint.
#[derive(Debug, Serialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Envelope {
    pub fn data(data: Value) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn message_data(message: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
        }
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        axum::Json(self).into_response()
    }
}

// ── Auth ──

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// The caller's own account, returned from register/login/verify.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: i64,
    pub uuid: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub profile_picture: Option<String>,
    pub is_verified: bool,
}

// ── Users ──

/// Minimal user identity attached to search results, viewers and actors.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i64,
    pub uuid: String,
    pub username: String,
    pub full_name: String,
    pub profile_picture: Option<String>,
    pub is_verified: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub id: i64,
    pub uuid: String,
    pub username: String,
    pub full_name: String,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub cover_picture: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub is_verified: bool,
    pub is_private: bool,
    pub created_at: i64,
    pub posts_count: i64,
    pub friends_count: i64,
    pub is_own_profile: bool,
    /// Friendship edge status between viewer and this user, in either
    /// direction. Null for anonymous viewers and for one's own profile.
    pub friendship_status: Option<String>,
}

/// Partial profile update. A field that is absent keeps its stored value;
/// an explicit `null` clears the nullable fields (double-`Option`).
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub bio: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub location: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub website: Option<Option<String>>,
    #[serde(default)]
    pub is_private: Option<bool>,
}

/// Maps a present JSON value (including `null`) to `Some(..)` so that
/// "absent" and "set to null" stay distinguishable.
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: serde::Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

// ── Posts and comments ──

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: i64,
    pub uuid: String,
    pub user_id: i64,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    /// Stored but not enforced by the read queries; see DESIGN.md.
    pub privacy: String,
    pub created_at: i64,
    pub username: String,
    pub full_name: String,
    pub profile_picture: Option<String>,
    pub is_verified: bool,
    pub likes_count: i64,
    pub comments_count: i64,
    pub is_liked: bool,
    pub is_saved: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCommentRequest {
    pub content: String,
    #[serde(default)]
    pub parent_comment_id: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: i64,
    pub uuid: String,
    pub post_id: i64,
    pub user_id: i64,
    pub parent_comment_id: Option<i64>,
    pub content: String,
    pub created_at: i64,
    pub username: String,
    pub full_name: String,
    pub profile_picture: Option<String>,
    pub is_verified: bool,
    pub likes_count: i64,
    pub is_liked: bool,
}

// ── Friends ──

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendView {
    pub id: i64,
    pub uuid: String,
    pub username: String,
    pub full_name: String,
    pub profile_picture: Option<String>,
    pub is_verified: bool,
    pub friends_since: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequestView {
    pub id: i64,
    pub uuid: String,
    pub username: String,
    pub full_name: String,
    pub profile_picture: Option<String>,
    pub is_verified: bool,
    pub requested_at: i64,
}

// ── Messages ──

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: i64,
    pub uuid: String,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
    pub is_read: bool,
    pub created_at: i64,
    pub username: String,
    pub full_name: String,
    pub profile_picture: Option<String>,
}

/// Inbox entry: the latest message exchanged with one peer.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationView {
    pub id: i64,
    pub uuid: String,
    pub username: String,
    pub full_name: String,
    pub profile_picture: Option<String>,
    pub is_verified: bool,
    pub last_message: String,
    pub last_message_time: i64,
    pub is_own_message: bool,
    pub unread_count: i64,
}

// ── Notifications ──

/// Notification payload as a tagged variant. The persistence layer keeps a
/// single table with a type tag and nullable reference columns; the variant
/// is constructed at the boundary so each kind only carries its relevant
/// fields.
#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum NotificationKind {
    Like {
        post_id: i64,
    },
    Comment {
        post_id: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        preview: Option<String>,
    },
    FriendRequest,
    FriendAccept,
    Message {
        #[serde(skip_serializing_if = "Option::is_none")]
        preview: Option<String>,
    },
    Mention {
        post_id: i64,
    },
}

impl NotificationKind {
    /// Rebuild the variant from the stored row. Rows missing a reference id
    /// degrade to 0 rather than dropping the notification.
    pub fn from_row(kind: &str, reference_id: Option<i64>, preview: Option<String>) -> Self {
        let reference = reference_id.unwrap_or(0);
        match kind {
            "like" => NotificationKind::Like { post_id: reference },
            "comment" => NotificationKind::Comment {
                post_id: reference,
                preview,
            },
            "friend_request" => NotificationKind::FriendRequest,
            "friend_accept" => NotificationKind::FriendAccept,
            "mention" => NotificationKind::Mention { post_id: reference },
            _ => NotificationKind::Message { preview },
        }
    }

    pub fn type_tag(&self) -> &'static str {
        match self {
            NotificationKind::Like { .. } => "like",
            NotificationKind::Comment { .. } => "comment",
            NotificationKind::FriendRequest => "friend_request",
            NotificationKind::FriendAccept => "friend_accept",
            NotificationKind::Message { .. } => "message",
            NotificationKind::Mention { .. } => "mention",
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    pub id: i64,
    pub uuid: String,
    #[serde(flatten)]
    pub kind: NotificationKind,
    /// Profile of the user whose action triggered this notification.
    pub actor: Option<UserSummary>,
    pub is_read: bool,
    pub created_at: i64,
}

// ── Stories ──

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryItem {
    pub id: i64,
    pub uuid: String,
    pub media_url: String,
    pub media_type: String,
    pub caption: Option<String>,
    pub views_count: i64,
    pub is_viewed: bool,
    pub created_at: i64,
    pub expires_at: i64,
}

/// One author's active stories, newest first.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryGroup {
    pub user: UserSummary,
    pub stories: Vec<StoryItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryViewerView {
    pub id: i64,
    pub username: String,
    pub full_name: String,
    pub profile_picture: Option<String>,
    pub viewed_at: i64,
}
