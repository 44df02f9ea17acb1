//! Event request/response DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Event, EventId, EventStatus, EventSummary, UserId};
use crate::service::NewEvent;

/// Request body for `POST /api/v1/events`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateEventRequest {
    /// Display title (1–200 characters).
    pub title: String,
    /// Number of confirmed slots (at least 1).
    pub capacity: u32,
    /// When the event takes place (RFC 3339).
    pub starts_at: DateTime<Utc>,
}

impl From<CreateEventRequest> for NewEvent {
    fn from(req: CreateEventRequest) -> Self {
        Self {
            title: req.title,
            capacity: req.capacity,
            starts_at: req.starts_at,
        }
    }
}

/// Event as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EventDto {
    /// Event identifier.
    pub event_id: EventId,
    /// Hosting user.
    pub host_id: UserId,
    /// Display title.
    pub title: String,
    /// Confirmed slot count.
    pub capacity: u32,
    /// Cached lifecycle status.
    pub status: EventStatus,
    /// Start time.
    pub starts_at: DateTime<Utc>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl From<Event> for EventDto {
    fn from(event: Event) -> Self {
        Self {
            event_id: event.id,
            host_id: event.host_id,
            title: event.title,
            capacity: event.capacity,
            status: event.status,
            starts_at: event.starts_at,
            created_at: event.created_at,
            updated_at: event.updated_at,
        }
    }
}

/// Event with live registration counts.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EventSummaryDto {
    /// The event.
    pub event: EventDto,
    /// Confirmed registrations.
    pub confirmed_count: u32,
    /// Waitlisted registrations.
    pub waitlist_count: u32,
    /// Confirmed slots still free.
    pub remaining_slots: u32,
}

impl From<EventSummary> for EventSummaryDto {
    fn from(summary: EventSummary) -> Self {
        let remaining_slots = summary.remaining_slots();
        Self {
            event: summary.event.into(),
            confirmed_count: summary.confirmed_count,
            waitlist_count: summary.waitlist_count,
            remaining_slots,
        }
    }
}

/// Response for `GET /api/v1/users/{id}/events`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EventListResponse {
    /// Events, latest start time first.
    pub data: Vec<EventDto>,
    /// Number of entries in `data`.
    pub total: usize,
}

impl From<Vec<Event>> for EventListResponse {
    fn from(events: Vec<Event>) -> Self {
        let data: Vec<EventDto> = events.into_iter().map(Into::into).collect();
        Self {
            total: data.len(),
            data,
        }
    }
}

/// Response for `POST /api/v1/events/{id}/cancel`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CancelEventResponse {
    /// Cancelled event.
    pub event_id: EventId,
    /// Always `cancelled`.
    pub status: EventStatus,
    /// Number of active registrations swept.
    pub cancelled_registrations: usize,
}
