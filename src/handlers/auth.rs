//! Registration, login, token verification and password changes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use super::extract::Json;
use crate::auth::{hash_password, issue_token, verify_password, AuthUser};
use crate::error::ApiError;
use crate::models::{
    AccountView, ChangePasswordRequest, Envelope, LoginRequest, RegisterRequest,
};
use crate::state::SharedState;
use crate::urls::{absolutize_account, BaseUrl};
use crate::validation::{validate_email, validate_non_empty, validate_password, validate_username};

pub async fn register(
    State(state): State<SharedState>,
    BaseUrl(base): BaseUrl,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.trim();
    let email = req.email.trim().to_lowercase();
    let full_name = req.full_name.trim();

    validate_username(username).map_err(ApiError::Validation)?;
    validate_email(&email).map_err(ApiError::Validation)?;
    validate_password(&req.password).map_err(ApiError::Validation)?;
    validate_non_empty(full_name, "Full name").map_err(ApiError::Validation)?;

    if state.db.email_or_username_exists(&email, username).await? {
        return Err(ApiError::Conflict(
            "Email or username is already in use".to_string(),
        ));
    }

    let password_hash = hash_password(&req.password)?;
    let (user_id, uuid) = state
        .db
        .create_user(username, &email, &password_hash, full_name)
        .await?;
    let token = issue_token(&state.config, user_id, &uuid)?;

    let mut account = AccountView {
        id: user_id,
        uuid,
        username: username.to_string(),
        email,
        full_name: full_name.to_string(),
        profile_picture: None,
        is_verified: false,
    };
    absolutize_account(&base, &mut account);

    Ok((
        StatusCode::CREATED,
        Envelope::message_data(
            "Account created",
            json!({ "token": token, "user": account }),
        ),
    ))
}

pub async fn login(
    State(state): State<SharedState>,
    BaseUrl(base): BaseUrl,
    Json(req): Json<LoginRequest>,
) -> Result<Envelope, ApiError> {
    let email = req.email.trim().to_lowercase();
    let Some(credentials) = state.db.get_user_credentials_by_email(&email).await? else {
        return Err(ApiError::Auth("Invalid email or password".to_string()));
    };
    if !verify_password(&req.password, &credentials.password_hash) {
        return Err(ApiError::Auth("Invalid email or password".to_string()));
    }

    state.db.touch_last_login(credentials.id).await?;
    let token = issue_token(&state.config, credentials.id, &credentials.uuid)?;

    let mut account = AccountView {
        id: credentials.id,
        uuid: credentials.uuid,
        username: credentials.username,
        email: credentials.email,
        full_name: credentials.full_name,
        profile_picture: credentials.profile_picture,
        is_verified: credentials.is_verified,
    };
    absolutize_account(&base, &mut account);

    Ok(Envelope::message_data(
        "Login successful",
        json!({ "token": token, "user": account }),
    ))
}

pub async fn verify(
    State(state): State<SharedState>,
    BaseUrl(base): BaseUrl,
    user: AuthUser,
) -> Result<Envelope, ApiError> {
    let Some(mut account) = state.db.get_account(user.user_id).await? else {
        return Err(ApiError::NotFound("User not found".to_string()));
    };
    absolutize_account(&base, &mut account);
    Ok(Envelope::data(json!({ "user": account })))
}

pub async fn change_password(
    State(state): State<SharedState>,
    user: AuthUser,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Envelope, ApiError> {
    validate_password(&req.new_password).map_err(ApiError::Validation)?;

    let Some(current_hash) = state.db.get_password_hash(user.user_id).await? else {
        return Err(ApiError::NotFound("User not found".to_string()));
    };
    if !verify_password(&req.current_password, &current_hash) {
        return Err(ApiError::Auth("Current password is incorrect".to_string()));
    }

    let new_hash = hash_password(&req.new_password)?;
    state.db.set_password_hash(user.user_id, &new_hash).await?;
    Ok(Envelope::message("Password changed"))
}
