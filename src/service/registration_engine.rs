//! The two transactional protocols: register-with-lock and
//! cancel-and-promote.
//!
//! Both run inside a caller-supplied transaction and leave committing
//! to the caller. An `Err` means the transaction must be dropped, which
//! rolls back every write made here.
//!
//! Both protocols lock the event row before any registration row, so
//! every change to an event's registrations is serialized on that one
//! lock and the lock order is the same everywhere.

use chrono::{DateTime, Utc};

use crate::domain::{EventId, Placement, Registration, RegistrationId, UserId, Vacated};
use crate::error::RegistrationError;
use crate::persistence::{EventAccessor, RegistrationAccessor};

/// Result of a committed cancellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelOutcome {
    /// The registration as written after cancellation.
    pub cancelled: Registration,
    /// The waitlisted registration moved into the freed slot, if any.
    pub promoted: Option<Registration>,
}

/// Registers `user_id` for `event_id`, confirming when a slot is free
/// and appending to the waitlist otherwise.
///
/// The event row lock serializes concurrent registrations, so the
/// confirmed count read afterwards is authoritative. A cancelled row
/// left by an earlier registration is revived in place.
///
/// # Errors
///
/// - [`RegistrationError::EventNotFound`] if the event does not exist.
/// - [`RegistrationError::EventNotOpen`] if it is cancelled or completed.
/// - [`RegistrationError::HostCannotRegister`] if the user hosts it.
/// - [`RegistrationError::AlreadyRegistered`] if the user holds an
///   active registration.
/// - [`RegistrationError::Internal`] on storage failure.
pub async fn register<T>(
    tx: &mut T,
    event_id: EventId,
    user_id: UserId,
    now: DateTime<Utc>,
) -> Result<Registration, RegistrationError>
where
    T: EventAccessor + RegistrationAccessor,
{
    let event = tx
        .lock_event(event_id)
        .await?
        .ok_or(RegistrationError::EventNotFound(event_id))?;

    if !event.status.accepts_registrations() {
        return Err(RegistrationError::EventNotOpen(event_id));
    }
    if event.is_hosted_by(user_id) {
        return Err(RegistrationError::HostCannotRegister);
    }

    let existing = tx.find_by_event_and_user(event_id, user_id).await?;
    if existing.as_ref().is_some_and(Registration::is_active) {
        return Err(RegistrationError::AlreadyRegistered);
    }

    let confirmed = tx.count_confirmed(event_id).await?;
    let max_position = if confirmed < event.capacity {
        None
    } else {
        tx.max_waitlist_position(event_id).await?
    };
    let placement = Placement::decide(confirmed, event.capacity, max_position);

    let registration = match existing {
        Some(mut previous) => {
            previous.revive(placement, now)?;
            tx.update_registration(&previous).await?;
            previous
        }
        None => {
            let fresh = Registration::new(event_id, user_id, placement, now);
            tx.insert_registration(&fresh).await?;
            fresh
        }
    };

    tracing::debug!(
        %event_id,
        %user_id,
        registration_id = %registration.id,
        status = %registration.status,
        position = ?registration.waitlist_position,
        "registration placed"
    );
    Ok(registration)
}

/// Cancels a registration and, when it held a confirmed slot, promotes
/// the head of the waitlist into it.
///
/// Cancelling a waitlisted registration shifts every later position
/// down by one. Cancelling a confirmed one promotes the lowest-position
/// waitlisted row (skipping rows locked elsewhere) and closes the gap it
/// leaves. Confirmed rows are never moved back to the waitlist.
///
/// The event row is locked first, so a concurrent [`register`] waits
/// until the shifted positions are committed before it reads them.
///
/// # Errors
///
/// - [`RegistrationError::EventNotFound`] if the event does not exist.
/// - [`RegistrationError::RegistrationNotFound`] if the registration
///   does not exist or belongs to another event.
/// - [`RegistrationError::AlreadyCancelled`] if it is already cancelled.
/// - [`RegistrationError::Transition`] if a stored row is inconsistent.
/// - [`RegistrationError::Internal`] on storage failure.
pub async fn cancel_and_promote<T>(
    tx: &mut T,
    registration_id: RegistrationId,
    event_id: EventId,
    now: DateTime<Utc>,
) -> Result<CancelOutcome, RegistrationError>
where
    T: EventAccessor + RegistrationAccessor,
{
    tx.lock_event(event_id)
        .await?
        .ok_or(RegistrationError::EventNotFound(event_id))?;

    let mut registration = tx
        .lock_registration(registration_id)
        .await?
        .filter(|r| r.event_id == event_id)
        .ok_or(RegistrationError::RegistrationNotFound)?;

    if !registration.is_active() {
        return Err(RegistrationError::AlreadyCancelled);
    }

    let vacated = registration.cancel(now)?;
    tx.update_registration(&registration).await?;

    let promoted = match vacated {
        Vacated::WaitlistPosition(position) => {
            let shifted = tx.close_waitlist_gap(event_id, position).await?;
            tracing::debug!(%event_id, position, shifted, "waitlist gap closed");
            None
        }
        Vacated::ConfirmedSlot => promote_head(tx, event_id, now).await?,
    };

    Ok(CancelOutcome {
        cancelled: registration,
        promoted,
    })
}

async fn promote_head<T>(
    tx: &mut T,
    event_id: EventId,
    now: DateTime<Utc>,
) -> Result<Option<Registration>, RegistrationError>
where
    T: RegistrationAccessor,
{
    let Some(mut head) = tx.first_waitlisted_skip_locked(event_id).await? else {
        return Ok(None);
    };
    let vacated_position = head.promote(now)?;
    tx.update_registration(&head).await?;
    let shifted = tx.close_waitlist_gap(event_id, vacated_position).await?;

    tracing::debug!(
        %event_id,
        registration_id = %head.id,
        user_id = %head.user_id,
        shifted,
        "waitlist head promoted"
    );
    Ok(Some(head))
}
