//! Registration response DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{EventId, Registration, RegistrationId, RegistrationStatus, UserId};
use crate::service::CancelOutcome;

/// Registration as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegistrationDto {
    /// Registration identifier.
    pub registration_id: RegistrationId,
    /// Event registered for.
    pub event_id: EventId,
    /// Registrant.
    pub user_id: UserId,
    /// `confirmed`, `waitlist` or `cancelled`.
    pub status: RegistrationStatus,
    /// 1-based waitlist position, only while waitlisted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waitlist_position: Option<u32>,
    /// When the registration was (re)made.
    pub registered_at: DateTime<Utc>,
    /// When it became confirmed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<DateTime<Utc>>,
    /// When it was cancelled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl From<Registration> for RegistrationDto {
    fn from(r: Registration) -> Self {
        Self {
            registration_id: r.id,
            event_id: r.event_id,
            user_id: r.user_id,
            status: r.status,
            waitlist_position: r.waitlist_position,
            registered_at: r.registered_at,
            confirmed_at: r.confirmed_at,
            cancelled_at: r.cancelled_at,
        }
    }
}

/// Response for `DELETE /api/v1/events/{id}/registrations`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CancelRegistrationResponse {
    /// The caller's registration after cancellation.
    pub cancelled: RegistrationDto,
    /// The waitlisted registration promoted into the freed slot.
    pub promoted: Option<RegistrationDto>,
}

impl From<CancelOutcome> for CancelRegistrationResponse {
    fn from(outcome: CancelOutcome) -> Self {
        Self {
            cancelled: outcome.cancelled.into(),
            promoted: outcome.promoted.map(Into::into),
        }
    }
}

/// A list of registrations.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegistrationListResponse {
    /// Registrations, in roster order.
    pub data: Vec<RegistrationDto>,
    /// Number of entries in `data`.
    pub total: usize,
}

impl From<Vec<Registration>> for RegistrationListResponse {
    fn from(rows: Vec<Registration>) -> Self {
        let data: Vec<RegistrationDto> = rows.into_iter().map(Into::into).collect();
        Self {
            total: data.len(),
            data,
        }
    }
}
