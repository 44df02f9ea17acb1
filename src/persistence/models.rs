//! Database row shapes and their conversion into domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::StoreError;
use crate::domain::{Event, EventId, Registration, RegistrationId, UserId};

/// Confirmed and waitlisted registration counts for one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistrationCounts {
    /// Registrations holding a capacity slot.
    pub confirmed: u32,
    /// Registrations on the waitlist.
    pub waitlisted: u32,
}

/// `events` row: id, host_id, title, capacity, status, starts_at,
/// created_at, updated_at.
pub(crate) type EventRow = (
    Uuid,
    Uuid,
    String,
    i32,
    String,
    DateTime<Utc>,
    DateTime<Utc>,
    DateTime<Utc>,
);

/// `registrations` row: id, event_id, user_id, status,
/// waitlist_position, registered_at, confirmed_at, cancelled_at.
pub(crate) type RegistrationRow = (
    Uuid,
    Uuid,
    Uuid,
    String,
    Option<i32>,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
    Option<DateTime<Utc>>,
);

pub(crate) fn event_from_row(row: EventRow) -> Result<Event, StoreError> {
    let (id, host_id, title, capacity, status, starts_at, created_at, updated_at) = row;
    let capacity = u32::try_from(capacity)
        .ok()
        .filter(|c| *c > 0)
        .ok_or_else(|| StoreError::Corrupt(format!("event {id} has capacity {capacity}")))?;
    let status = status
        .parse()
        .map_err(|e| StoreError::Corrupt(format!("event {id}: {e}")))?;

    Ok(Event {
        id: EventId::from_uuid(id),
        host_id: UserId::from_uuid(host_id),
        title,
        capacity,
        status,
        starts_at,
        created_at,
        updated_at,
    })
}

pub(crate) fn registration_from_row(row: RegistrationRow) -> Result<Registration, StoreError> {
    let (id, event_id, user_id, status, position, registered_at, confirmed_at, cancelled_at) = row;
    let status = status
        .parse()
        .map_err(|e| StoreError::Corrupt(format!("registration {id}: {e}")))?;
    let waitlist_position = position
        .map(|p| {
            u32::try_from(p).map_err(|_| {
                StoreError::Corrupt(format!("registration {id} has waitlist position {p}"))
            })
        })
        .transpose()?;

    let registration = Registration {
        id: RegistrationId::from_uuid(id),
        event_id: EventId::from_uuid(event_id),
        user_id: UserId::from_uuid(user_id),
        status,
        waitlist_position,
        registered_at,
        confirmed_at,
        cancelled_at,
    };
    registration.validate().map_err(StoreError::Corrupt)?;
    Ok(registration)
}

/// Narrows a domain count or position to the `INTEGER` column type.
pub(crate) fn to_db_int(value: u32) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{value} exceeds INTEGER range")))
}

/// Widens a `COUNT(*)` result to a domain count.
pub(crate) fn from_db_count(value: i64) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("count {value} out of range")))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{EventStatus, RegistrationStatus};

    fn event_row(capacity: i32, status: &str) -> EventRow {
        let now = Utc::now();
        (
            Uuid::new_v4(),
            Uuid::new_v4(),
            "Sunday doubles".to_string(),
            capacity,
            status.to_string(),
            now,
            now,
            now,
        )
    }

    fn registration_row(status: &str, position: Option<i32>) -> RegistrationRow {
        (
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            status.to_string(),
            position,
            Utc::now(),
            None,
            None,
        )
    }

    #[test]
    fn decodes_event_row() {
        let Ok(event) = event_from_row(event_row(8, "full")) else {
            panic!("valid row");
        };
        assert_eq!(event.capacity, 8);
        assert_eq!(event.status, EventStatus::Full);
    }

    #[test]
    fn rejects_non_positive_capacity() {
        assert!(event_from_row(event_row(0, "open")).is_err());
        assert!(event_from_row(event_row(-3, "open")).is_err());
    }

    #[test]
    fn rejects_unknown_status() {
        assert!(event_from_row(event_row(4, "archived")).is_err());
        assert!(registration_from_row(registration_row("pending", None)).is_err());
    }

    #[test]
    fn decodes_waitlisted_registration() {
        let Ok(reg) = registration_from_row(registration_row("waitlist", Some(2))) else {
            panic!("valid row");
        };
        assert_eq!(reg.status, RegistrationStatus::Waitlist);
        assert_eq!(reg.waitlist_position, Some(2));
    }

    #[test]
    fn rejects_position_status_mismatch() {
        assert!(registration_from_row(registration_row("waitlist", None)).is_err());
        assert!(registration_from_row(registration_row("confirmed", Some(1))).is_err());
        assert!(registration_from_row(registration_row("waitlist", Some(-1))).is_err());
    }

    #[test]
    fn int_conversions_check_range() {
        assert_eq!(to_db_int(7).ok(), Some(7));
        assert!(to_db_int(u32::MAX).is_err());
        assert_eq!(from_db_count(3).ok(), Some(3));
        assert!(from_db_count(-1).is_err());
    }
}
