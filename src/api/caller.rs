//! Caller identity extractor.
//!
//! An upstream authenticating proxy sets the `x-user-id` header to the
//! caller's UUID. Requests without a parseable header are rejected with
//! [`ApiError::Unauthenticated`].

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::domain::UserId;
use crate::error::ApiError;

/// Header carrying the authenticated user's ID.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerId(pub UserId);

impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| uuid::Uuid::parse_str(s.trim()).ok())
            .map(|uuid| Self(UserId::from_uuid(uuid)))
            .ok_or(ApiError::Unauthenticated)
    }
}
