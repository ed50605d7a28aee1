//! Caller identity taken from the `x-user-id` header.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::UserId;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated user. Authentication itself happens upstream; this
/// only reads the id it forwards.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
            .map(|id| Caller(UserId::new(id)))
            .ok_or_else(|| {
                ApiError::BadRequest(format!("Missing or invalid {USER_ID_HEADER} header"))
            })
    }
}
