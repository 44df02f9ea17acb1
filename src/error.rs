//! Error types and their HTTP mapping.
//!
//! [`RegistrationError`] is the failure taxonomy of the registration
//! engine. Every error raised inside a transaction causes a rollback
//! and reaches the caller with its kind intact; the engine never
//! retries.
//!
//! [`ApiError`] is what HTTP handlers return. Each variant maps to an
//! HTTP status code and a structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{EventId, TransitionError};
use crate::persistence::StoreError;

/// Failure of a registration or event-management operation.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    /// The event is cancelled or completed.
    #[error("event {0} is not open for registration")]
    EventNotOpen(EventId),

    /// The requesting user hosts the event.
    #[error("host cannot register for their own event")]
    HostCannotRegister,

    /// The user already holds an active registration for the event.
    #[error("user is already registered for this event")]
    AlreadyRegistered,

    /// The registration is already cancelled.
    #[error("registration is already cancelled")]
    AlreadyCancelled,

    /// No event with this ID exists.
    #[error("event not found: {0}")]
    EventNotFound(EventId),

    /// No registration matches the request.
    #[error("registration not found")]
    RegistrationNotFound,

    /// Only the host may perform this event operation.
    #[error("only the host may manage event {0}")]
    NotEventHost(EventId),

    /// Input rejected before touching the store.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A stored row could not make the requested state transition.
    #[error("state machine violation: {0}")]
    Transition(#[from] TransitionError),

    /// Datastore failure: connection loss, lock timeout, constraint
    /// violation.
    #[error("internal error: {0}")]
    Internal(#[from] StoreError),
}

impl RegistrationError {
    /// Returns `true` for the not-found kinds.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::EventNotFound(_) | Self::RegistrationNotFound)
    }

    /// Returns `true` for failures of the system rather than of the
    /// request.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_) | Self::Transition(_))
    }
}

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2003,
///     "message": "user is already registered for this event",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see [`ApiError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                     |
/// |-----------|-----------------|---------------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request / 401           |
/// | 2000–2999 | State/Not Found | 404 / 409 Conflict / 403        |
/// | 3000–3999 | Server          | 500 Internal Server Error       |
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The caller identity header is missing or malformed.
    #[error("missing or invalid caller identity")]
    Unauthenticated,

    /// Error raised by the registration service.
    #[error(transparent)]
    Registration(#[from] RegistrationError),
}

impl ApiError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::Unauthenticated => 1002,
            Self::Registration(err) => match err {
                RegistrationError::InvalidInput(_) => 1003,
                RegistrationError::EventNotFound(_) => 2001,
                RegistrationError::RegistrationNotFound => 2002,
                RegistrationError::AlreadyRegistered => 2003,
                RegistrationError::AlreadyCancelled => 2004,
                RegistrationError::EventNotOpen(_) => 2005,
                RegistrationError::HostCannotRegister => 2006,
                RegistrationError::NotEventHost(_) => 2007,
                RegistrationError::Transition(_) => 3002,
                RegistrationError::Internal(_) => 3001,
            },
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Registration(err) => match err {
                RegistrationError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                RegistrationError::EventNotFound(_) | RegistrationError::RegistrationNotFound => {
                    StatusCode::NOT_FOUND
                }
                RegistrationError::AlreadyRegistered
                | RegistrationError::AlreadyCancelled
                | RegistrationError::EventNotOpen(_) => StatusCode::CONFLICT,
                RegistrationError::HostCannotRegister | RegistrationError::NotEventHost(_) => {
                    StatusCode::FORBIDDEN
                }
                RegistrationError::Transition(_) | RegistrationError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Datastore details stay in the logs.
        let message = if let Self::Registration(err) = &self
            && err.is_internal()
        {
            tracing::error!(error = %err, "registration request failed");
            "internal error".to_string()
        } else {
            self.to_string()
        };
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message,
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
