//! Domain events emitted after a registration change commits.
//!
//! Every committed change produces a [`RegistrationEvent`] that is handed
//! to the [`super::NotificationDispatcher`]. Events are never emitted for
//! rolled-back transactions.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{EventId, RegistrationId, RegistrationStatus, UserId};

/// Post-commit domain event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum RegistrationEvent {
    /// A user registered (or re-registered) for an event.
    Registered {
        /// Event registered for.
        event_id: EventId,
        /// Registrant.
        user_id: UserId,
        /// Registration row.
        registration_id: RegistrationId,
        /// Confirmed or waitlist.
        status: RegistrationStatus,
        /// Waitlist position when waitlisted.
        waitlist_position: Option<u32>,
        /// Commit timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A user withdrew a registration.
    RegistrationCancelled {
        /// Event affected.
        event_id: EventId,
        /// User who cancelled.
        user_id: UserId,
        /// Registration row.
        registration_id: RegistrationId,
        /// Commit timestamp.
        timestamp: DateTime<Utc>,
    },

    /// The head of the waitlist moved into a freed confirmed slot.
    WaitlistPromoted {
        /// Event affected.
        event_id: EventId,
        /// The promoted user, who should be told.
        user_id: UserId,
        /// Registration row that was promoted.
        registration_id: RegistrationId,
        /// Human-readable event label, see [`super::Event::label`].
        event_label: String,
        /// Commit timestamp.
        timestamp: DateTime<Utc>,
    },

    /// The host called off the event; one event per affected registrant.
    EventCancelled {
        /// Event that was cancelled.
        event_id: EventId,
        /// Registrant whose registration was swept.
        user_id: UserId,
        /// Human-readable event label.
        event_label: String,
        /// Commit timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl RegistrationEvent {
    /// Returns the event ID this domain event concerns.
    #[must_use]
    pub const fn event_id(&self) -> EventId {
        match self {
            Self::Registered { event_id, .. }
            | Self::RegistrationCancelled { event_id, .. }
            | Self::WaitlistPromoted { event_id, .. }
            | Self::EventCancelled { event_id, .. } => *event_id,
        }
    }

    /// Returns the user this domain event concerns.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        match self {
            Self::Registered { user_id, .. }
            | Self::RegistrationCancelled { user_id, .. }
            | Self::WaitlistPromoted { user_id, .. }
            | Self::EventCancelled { user_id, .. } => *user_id,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::Registered { .. } => "registered",
            Self::RegistrationCancelled { .. } => "registration_cancelled",
            Self::WaitlistPromoted { .. } => "waitlist_promoted",
            Self::EventCancelled { .. } => "event_cancelled",
        }
    }
}
