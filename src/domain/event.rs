//! Capacity-limited events and their cached status.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{EventId, UserId};

/// Maximum length of an event title, in characters.
pub const MAX_TITLE_LEN: usize = 200;

/// Lifecycle status of an event.
///
/// `Open` and `Full` are a cached summary of the confirmed count versus
/// capacity and are refreshed after each committed registration change.
/// `Cancelled` and `Completed` are terminal and set by event management.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// Accepting registrations with free confirmed slots.
    Open,
    /// Accepting registrations onto the waitlist only.
    Full,
    /// Called off by the host; no further registrations.
    Cancelled,
    /// Already took place; no further registrations.
    Completed,
}

impl EventStatus {
    /// Returns the storage/wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Full => "full",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    /// Returns `true` if the event still takes registrations, either
    /// confirmed or waitlisted.
    #[must_use]
    pub const fn accepts_registrations(self) -> bool {
        matches!(self, Self::Open | Self::Full)
    }

    /// Status an accepting event should carry for the given confirmed
    /// count. Terminal statuses are returned unchanged.
    #[must_use]
    pub const fn derived(self, confirmed: u32, capacity: u32) -> Self {
        match self {
            Self::Open | Self::Full if confirmed >= capacity => Self::Full,
            Self::Open | Self::Full => Self::Open,
            other => other,
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown status string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for EventStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "full" => Ok(Self::Full),
            "cancelled" => Ok(Self::Cancelled),
            "completed" => Ok(Self::Completed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// An event with a fixed number of confirmed slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    /// Event identifier.
    pub id: EventId,
    /// The hosting user; never allowed to register for this event.
    pub host_id: UserId,
    /// Display title.
    pub title: String,
    /// Maximum number of confirmed registrations (at least 1).
    pub capacity: u32,
    /// Cached lifecycle status.
    pub status: EventStatus,
    /// When the event takes place.
    pub starts_at: DateTime<Utc>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last status or detail change.
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Builds a new `Open` event hosted by `host_id`.
    #[must_use]
    pub fn new(
        host_id: UserId,
        title: String,
        capacity: u32,
        starts_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EventId::new(),
            host_id,
            title,
            capacity,
            status: EventStatus::Open,
            starts_at,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns `true` if `user_id` hosts this event.
    #[must_use]
    pub fn is_hosted_by(&self, user_id: UserId) -> bool {
        self.host_id == user_id
    }

    /// Short human-readable label used in notifications, e.g.
    /// `"03/14 @ Sunday doubles"`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} @ {}", self.starts_at.format("%m/%d"), self.title)
    }
}

/// An event together with its live registration counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventSummary {
    /// The event itself.
    pub event: Event,
    /// Number of confirmed registrations.
    pub confirmed_count: u32,
    /// Number of waitlisted registrations.
    pub waitlist_count: u32,
}

impl EventSummary {
    /// Confirmed slots still free.
    #[must_use]
    pub const fn remaining_slots(&self) -> u32 {
        self.event.capacity.saturating_sub(self.confirmed_count)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_event() -> Event {
        let starts_at = Utc.with_ymd_and_hms(2026, 3, 14, 18, 0, 0).single();
        let Some(starts_at) = starts_at else {
            panic!("valid date");
        };
        Event::new(UserId::new(), "Sunday doubles".to_string(), 4, starts_at, Utc::now())
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            EventStatus::Open,
            EventStatus::Full,
            EventStatus::Cancelled,
            EventStatus::Completed,
        ] {
            assert_eq!(status.as_str().parse::<EventStatus>(), Ok(status));
        }
        assert!("archived".parse::<EventStatus>().is_err());
    }

    #[test]
    fn only_open_and_full_accept_registrations() {
        assert!(EventStatus::Open.accepts_registrations());
        assert!(EventStatus::Full.accepts_registrations());
        assert!(!EventStatus::Cancelled.accepts_registrations());
        assert!(!EventStatus::Completed.accepts_registrations());
    }

    #[test]
    fn derived_status_tracks_capacity() {
        assert_eq!(EventStatus::Open.derived(3, 4), EventStatus::Open);
        assert_eq!(EventStatus::Open.derived(4, 4), EventStatus::Full);
        assert_eq!(EventStatus::Full.derived(3, 4), EventStatus::Open);
        assert_eq!(EventStatus::Cancelled.derived(0, 4), EventStatus::Cancelled);
        assert_eq!(EventStatus::Completed.derived(9, 4), EventStatus::Completed);
    }

    #[test]
    fn new_event_is_open() {
        let event = make_event();
        assert_eq!(event.status, EventStatus::Open);
        assert!(event.is_hosted_by(event.host_id));
        assert!(!event.is_hosted_by(UserId::new()));
    }

    #[test]
    fn label_uses_month_day_and_title() {
        assert_eq!(make_event().label(), "03/14 @ Sunday doubles");
    }

    #[test]
    fn remaining_slots_saturates() {
        let summary = EventSummary {
            event: make_event(),
            confirmed_count: 5,
            waitlist_count: 2,
        };
        assert_eq!(summary.remaining_slots(), 0);
    }
}
