//! Registration handlers: register, cancel, rosters.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::caller::CallerId;
use crate::api::dto::{CancelRegistrationResponse, RegistrationDto, RegistrationListResponse};
use crate::app_state::AppState;
use crate::domain::{EventId, UserId};
use crate::error::{ApiError, ErrorResponse};

/// `POST /events/{id}/registrations` — Register the caller.
///
/// # Errors
///
/// Returns [`ApiError`] when the event is closed, the caller hosts it or
/// is already registered.
#[utoipa::path(
    post,
    path = "/api/v1/events/{id}/registrations",
    tag = "Registrations",
    summary = "Register for an event",
    description = "Confirms the caller when a slot is free, otherwise appends them to the end of the waitlist.",
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
        ("x-user-id" = uuid::Uuid, Header, description = "Caller user ID"),
    ),
    responses(
        (status = 201, description = "Confirmed or waitlisted", body = RegistrationDto),
        (status = 403, description = "Caller hosts the event", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
        (status = 409, description = "Already registered or event closed", body = ErrorResponse),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let registration = state
        .registrations
        .register(EventId::from_uuid(id), caller)
        .await?;
    Ok((StatusCode::CREATED, Json(RegistrationDto::from(registration))))
}

/// `DELETE /events/{id}/registrations` — Cancel the caller's registration.
///
/// # Errors
///
/// Returns [`ApiError`] when the caller has no registration or it is
/// already cancelled.
#[utoipa::path(
    delete,
    path = "/api/v1/events/{id}/registrations",
    tag = "Registrations",
    summary = "Cancel a registration",
    description = "Cancels the caller's registration. A freed confirmed slot goes to waitlist position 1; later positions shift down.",
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
        ("x-user-id" = uuid::Uuid, Header, description = "Caller user ID"),
    ),
    responses(
        (status = 200, description = "Cancelled; includes the promoted registration, if any", body = CancelRegistrationResponse),
        (status = 404, description = "No registration", body = ErrorResponse),
        (status = 409, description = "Already cancelled", body = ErrorResponse),
    )
)]
pub async fn cancel_registration(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .registrations
        .cancel_registration(EventId::from_uuid(id), caller)
        .await?;
    Ok(Json(CancelRegistrationResponse::from(outcome)))
}

/// `GET /events/{id}/registrations` — Event roster.
///
/// # Errors
///
/// Returns [`ApiError`] if the event does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/events/{id}/registrations",
    tag = "Registrations",
    summary = "List event registrations",
    description = "Active registrations: confirmed first, then the waitlist in position order.",
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
    ),
    responses(
        (status = 200, description = "Roster", body = RegistrationListResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn list_event_registrations(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = state
        .registrations
        .event_registrations(EventId::from_uuid(id))
        .await?;
    Ok(Json(RegistrationListResponse::from(rows)))
}

/// `GET /users/{id}/registrations` — A user's active registrations.
///
/// # Errors
///
/// Returns [`ApiError`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}/registrations",
    tag = "Registrations",
    summary = "List a user's registrations",
    description = "Active registrations of the user across all events, newest first.",
    params(
        ("id" = uuid::Uuid, Path, description = "User UUID"),
    ),
    responses(
        (status = 200, description = "Registrations", body = RegistrationListResponse),
    )
)]
pub async fn list_user_registrations(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = state
        .registrations
        .user_registrations(UserId::from_uuid(id))
        .await?;
    Ok(Json(RegistrationListResponse::from(rows)))
}

/// Registration routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/events/{id}/registrations",
            get(list_event_registrations)
                .post(register)
                .delete(cancel_registration),
        )
        .route("/users/{id}/registrations", get(list_user_registrations))
}
