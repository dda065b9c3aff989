//! Extractors whose rejections use the response envelope.
//!
//! The stock `Path`/`Query`/`Json` extractors reject with plain-text
//! bodies. These wrappers convert the rejection into an `ApiError` so a
//! malformed path parameter or request body produces the same
//! `{success, message}` shape as every other failure.

use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

pub(crate) struct Path<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequestParts<S> for Path<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match axum::extract::Path::<T>::from_request_parts(parts, state).await {
            Ok(axum::extract::Path(value)) => Ok(Path(value)),
            Err(err) => Err(ApiError::Validation(format!("Invalid path parameter: {err}"))),
        }
    }
}

pub(crate) struct Query<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequestParts<S> for Query<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match axum::extract::Query::<T>::from_request_parts(parts, state).await {
            Ok(axum::extract::Query(value)) => Ok(Query(value)),
            Err(err) => Err(ApiError::Validation(format!(
                "Invalid query parameters: {err}"
            ))),
        }
    }
}

pub(crate) struct Multipart(pub axum::extract::Multipart);

#[axum::async_trait]
impl<S> FromRequest<S> for Multipart
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::extract::Multipart::from_request(req, state).await {
            Ok(inner) => Ok(Multipart(inner)),
            Err(err) => Err(ApiError::Validation(format!("Invalid multipart body: {err}"))),
        }
    }
}

pub(crate) struct Json<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for Json<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::extract::Json::<T>::from_request(req, state).await {
            Ok(axum::extract::Json(value)) => Ok(Json(value)),
            Err(err) => Err(ApiError::Validation(format!("Invalid request body: {err}"))),
        }
    }
}
