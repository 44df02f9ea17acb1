//! Event handlers: create, get, cancel, hosted listing.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::caller::CallerId;
use crate::api::dto::{
    CancelEventResponse, CreateEventRequest, EventDto, EventListResponse, EventSummaryDto,
};
use crate::app_state::AppState;
use crate::domain::{EventId, EventStatus, UserId};
use crate::error::{ApiError, ErrorResponse};

/// `POST /events` — Create an event hosted by the caller.
///
/// # Errors
///
/// Returns [`ApiError`] on invalid input or storage failure.
#[utoipa::path(
    post,
    path = "/api/v1/events",
    tag = "Events",
    summary = "Create an event",
    description = "Creates an open event with a fixed number of confirmed slots. The caller becomes the host and can never register for it.",
    request_body = CreateEventRequest,
    params(
        ("x-user-id" = uuid::Uuid, Header, description = "Caller user ID"),
    ),
    responses(
        (status = 201, description = "Event created", body = EventDto),
        (status = 400, description = "Invalid title or capacity", body = ErrorResponse),
        (status = 401, description = "Missing caller identity", body = ErrorResponse),
    )
)]
pub async fn create_event(
    State(state): State<AppState>,
    CallerId(host_id): CallerId,
    Json(req): Json<CreateEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let event = state.registrations.create_event(host_id, req.into()).await?;
    Ok((StatusCode::CREATED, Json(EventDto::from(event))))
}

/// `GET /events/{id}` — Event with live registration counts.
///
/// # Errors
///
/// Returns [`ApiError`] if the event does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/events/{id}",
    tag = "Events",
    summary = "Get an event",
    description = "Returns the event together with its confirmed and waitlist counts.",
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
    ),
    responses(
        (status = 200, description = "Event summary", body = EventSummaryDto),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state
        .registrations
        .event_summary(EventId::from_uuid(id))
        .await?;
    Ok(Json(EventSummaryDto::from(summary)))
}

/// `POST /events/{id}/cancel` — Host cancels the event.
///
/// # Errors
///
/// Returns [`ApiError`] if the caller is not the host, the event is
/// missing, or it is already closed.
#[utoipa::path(
    post,
    path = "/api/v1/events/{id}/cancel",
    tag = "Events",
    summary = "Cancel an event",
    description = "Marks the event cancelled and cancels every confirmed and waitlisted registration in the same transaction. Each affected registrant is notified.",
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
        ("x-user-id" = uuid::Uuid, Header, description = "Caller user ID (must be the host)"),
    ),
    responses(
        (status = 200, description = "Event cancelled", body = CancelEventResponse),
        (status = 403, description = "Caller is not the host", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
        (status = 409, description = "Event already closed", body = ErrorResponse),
    )
)]
pub async fn cancel_event(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let event_id = EventId::from_uuid(id);
    let swept = state.registrations.cancel_event(event_id, caller).await?;
    Ok(Json(CancelEventResponse {
        event_id,
        status: EventStatus::Cancelled,
        cancelled_registrations: swept.len(),
    }))
}

/// `GET /users/{id}/events` — Events hosted by a user.
///
/// # Errors
///
/// Returns [`ApiError`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}/events",
    tag = "Events",
    summary = "List a host's events",
    description = "Every event the user hosts, cancelled and completed ones included, latest start time first.",
    params(
        ("id" = uuid::Uuid, Path, description = "Host user UUID"),
    ),
    responses(
        (status = 200, description = "Hosted events", body = EventListResponse),
    )
)]
pub async fn list_hosted_events(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let events = state
        .registrations
        .hosted_events(UserId::from_uuid(id))
        .await?;
    Ok(Json(EventListResponse::from(events)))
}

/// Event routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/events", post(create_event))
        .route("/events/{id}", get(get_event))
        .route("/events/{id}/cancel", post(cancel_event))
        .route("/users/{id}/events", get(list_hosted_events))
}
