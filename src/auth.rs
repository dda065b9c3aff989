//! Authentication: password hashing, bearer tokens, request extractors.
//!
//! Tokens are stateless JWTs signed with the configured secret and carry
//! the numeric user id plus the external uuid. Protected routes take an
//! [`AuthUser`] argument; routes with optional auth take [`MaybeAuthUser`],
//! which degrades to anonymous instead of rejecting.

use anyhow::{Context, Result};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

use crate::config::AppConfig;
use crate::db::now;
use crate::error::ApiError;
use crate::state::SharedState;

/// Bcrypt cost factor, matching common interactive-login guidance.
const BCRYPT_COST: u32 = 10;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Numeric user id.
    pub sub: i64,
    /// External user uuid.
    pub uuid: String,
    pub iat: i64,
    pub exp: i64,
}

pub fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, BCRYPT_COST).context("Failed to hash password")
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Issues a signed bearer token for the given user.
pub fn issue_token(config: &AppConfig, user_id: i64, uuid: &str) -> Result<String> {
    let issued_at = now();
    let claims = Claims {
        sub: user_id,
        uuid: uuid.to_string(),
        iat: issued_at,
        exp: issued_at + config.token_ttl_secs,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .context("Failed to sign token")
}

/// Verifies a bearer token. Returns `None` for invalid or expired tokens.
pub fn verify_token(config: &AppConfig, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .ok()
}

/// Authenticated caller, extracted from the `Authorization: Bearer` header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub uuid: String,
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    SharedState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = SharedState::from_ref(state);
        let token = bearer_token(parts)
            .ok_or_else(|| ApiError::Auth("Missing authentication token".to_string()))?;
        let claims = verify_token(&state.config, token)
            .ok_or_else(|| ApiError::Auth("Invalid or expired token".to_string()))?;
        Ok(AuthUser {
            user_id: claims.sub,
            uuid: claims.uuid,
        })
    }
}

/// Optional-auth extractor: anonymous callers get `MaybeAuthUser(None)`.
/// A present but invalid token is also treated as anonymous, matching the
/// lenient behavior of public read endpoints.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

impl MaybeAuthUser {
    pub fn user_id(&self) -> Option<i64> {
        self.0.as_ref().map(|user| user.user_id)
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
    SharedState: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = SharedState::from_ref(state);
        let user = bearer_token(parts)
            .and_then(|token| verify_token(&state.config, token))
            .map(|claims| AuthUser {
                user_id: claims.sub,
                uuid: claims.uuid,
            });
        Ok(MaybeAuthUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn test_config() -> AppConfig {
        AppConfig::for_tests(PathBuf::from("/tmp"))
    }

    #[test]
    fn password_round_trip() {
        let hash = hash_password("pw123456").unwrap();
        assert!(verify_password("pw123456", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn verify_rejects_garbage_hash() {
        assert!(!verify_password("pw123456", "not-a-bcrypt-hash"));
    }

    #[test]
    fn token_round_trip() {
        let config = test_config();
        let token = issue_token(&config, 42, "abc-uuid").unwrap();
        let claims = verify_token(&config, &token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.uuid, "abc-uuid");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn token_rejected_with_wrong_secret() {
        let config = test_config();
        let token = issue_token(&config, 42, "abc-uuid").unwrap();

        let mut other = test_config();
        other.jwt_secret = "different".to_string();
        assert!(verify_token(&other, &token).is_none());
    }

    #[test]
    fn malformed_token_rejected() {
        let config = test_config();
        assert!(verify_token(&config, "garbage.token.here").is_none());
    }
}
