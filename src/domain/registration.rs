//! Registrations and their status state machine.
//!
//! ```text
//!            create/revive            promote
//!   (none) ───────────────► waitlist ─────────► confirmed
//!      │                       │                    │
//!      │ create/revive         │ cancel             │ cancel
//!      └──────► confirmed      ▼                    ▼
//!                           cancelled ◄─────────────┘
//!                              │
//!                              └── revive ──► confirmed | waitlist
//! ```
//!
//! There is no `confirmed → waitlist` edge: a confirmed registration is
//! only ever cancelled. Every transition is a method on [`Registration`]
//! that refuses illegal moves with a [`TransitionError`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::event::UnknownStatus;
use super::{EventId, RegistrationId, UserId};

/// Status of a single registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    /// Holds one of the event's capacity slots.
    Confirmed,
    /// Queued behind the confirmed registrants.
    Waitlist,
    /// Withdrawn; history is kept, the row may be revived later.
    Cancelled,
}

impl RegistrationStatus {
    /// Returns the storage/wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Waitlist => "waitlist",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns `true` for confirmed and waitlisted registrations.
    #[must_use]
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistrationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(Self::Confirmed),
            "waitlist" => Ok(Self::Waitlist),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Where a new (or revived) registration lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// A capacity slot is free.
    Confirmed,
    /// Appended to the tail of the waitlist at `position` (1-based).
    Waitlisted {
        /// Waitlist position.
        position: u32,
    },
}

impl Placement {
    /// Decides placement from the authoritative confirmed count.
    ///
    /// `max_position` is the current highest waitlist position for the
    /// event, `None` when the waitlist is empty.
    #[must_use]
    pub const fn decide(confirmed: u32, capacity: u32, max_position: Option<u32>) -> Self {
        if confirmed < capacity {
            return Self::Confirmed;
        }
        let position = match max_position {
            Some(max) => max.saturating_add(1),
            None => 1,
        };
        Self::Waitlisted { position }
    }

    /// Whether the placement needs a waitlist position at all.
    #[must_use]
    pub const fn is_waitlisted(self) -> bool {
        matches!(self, Self::Waitlisted { .. })
    }
}

/// What a cancellation freed up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vacated {
    /// A confirmed capacity slot; the head of the waitlist may move up.
    ConfirmedSlot,
    /// A waitlist position; later positions shift down by one.
    WaitlistPosition(u32),
}

/// An illegal state-machine move.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// The requested transition does not exist.
    #[error("illegal registration transition {from} -> {to}")]
    Illegal {
        /// Current status.
        from: RegistrationStatus,
        /// Requested status.
        to: RegistrationStatus,
    },

    /// A waitlisted row carries no position.
    #[error("waitlisted registration {0} has no waitlist position")]
    MissingPosition(RegistrationId),
}

/// A user's registration for one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    /// Registration identifier, stable across revival.
    pub id: RegistrationId,
    /// The event registered for.
    pub event_id: EventId,
    /// The registrant.
    pub user_id: UserId,
    /// Current status.
    pub status: RegistrationStatus,
    /// 1-based position, present iff `status` is `Waitlist`.
    pub waitlist_position: Option<u32>,
    /// When the current (possibly revived) registration was made.
    pub registered_at: DateTime<Utc>,
    /// When the registration last became confirmed.
    pub confirmed_at: Option<DateTime<Utc>>,
    /// When the registration was cancelled; cleared on revival.
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Registration {
    /// Creates a fresh registration with the given placement.
    #[must_use]
    pub fn new(
        event_id: EventId,
        user_id: UserId,
        placement: Placement,
        now: DateTime<Utc>,
    ) -> Self {
        let mut registration = Self {
            id: RegistrationId::new(),
            event_id,
            user_id,
            status: RegistrationStatus::Cancelled,
            waitlist_position: None,
            registered_at: now,
            confirmed_at: None,
            cancelled_at: None,
        };
        registration.place(placement, now);
        registration
    }

    /// Returns `true` unless the registration is cancelled.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Reuses a cancelled registration for a new active registration by
    /// the same user, keeping its identity.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::Illegal`] unless the registration is
    /// currently cancelled.
    pub fn revive(
        &mut self,
        placement: Placement,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if self.status != RegistrationStatus::Cancelled {
            return Err(TransitionError::Illegal {
                from: self.status,
                to: match placement {
                    Placement::Confirmed => RegistrationStatus::Confirmed,
                    Placement::Waitlisted { .. } => RegistrationStatus::Waitlist,
                },
            });
        }
        self.registered_at = now;
        self.confirmed_at = None;
        self.cancelled_at = None;
        self.place(placement, now);
        Ok(())
    }

    /// Cancels an active registration, clearing its waitlist position.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::Illegal`] if already cancelled and
    /// [`TransitionError::MissingPosition`] if a waitlisted row has no
    /// position.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<Vacated, TransitionError> {
        let vacated = match self.status {
            RegistrationStatus::Confirmed => Vacated::ConfirmedSlot,
            RegistrationStatus::Waitlist => Vacated::WaitlistPosition(
                self.waitlist_position
                    .ok_or(TransitionError::MissingPosition(self.id))?,
            ),
            RegistrationStatus::Cancelled => {
                return Err(TransitionError::Illegal {
                    from: RegistrationStatus::Cancelled,
                    to: RegistrationStatus::Cancelled,
                });
            }
        };
        self.status = RegistrationStatus::Cancelled;
        self.waitlist_position = None;
        self.cancelled_at = Some(now);
        Ok(vacated)
    }

    /// Moves a waitlisted registration into a confirmed slot, returning
    /// the position it vacated.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::Illegal`] unless the registration is
    /// waitlisted, and [`TransitionError::MissingPosition`] if it carries
    /// no position.
    pub fn promote(&mut self, now: DateTime<Utc>) -> Result<u32, TransitionError> {
        if self.status != RegistrationStatus::Waitlist {
            return Err(TransitionError::Illegal {
                from: self.status,
                to: RegistrationStatus::Confirmed,
            });
        }
        let position = self
            .waitlist_position
            .ok_or(TransitionError::MissingPosition(self.id))?;
        self.status = RegistrationStatus::Confirmed;
        self.waitlist_position = None;
        self.confirmed_at = Some(now);
        Ok(position)
    }

    /// Checks the status/position pairing of a decoded row.
    ///
    /// # Errors
    ///
    /// Returns a description of the violated invariant.
    pub fn validate(&self) -> Result<(), String> {
        match (self.status, self.waitlist_position) {
            (RegistrationStatus::Waitlist, Some(0)) => {
                Err(format!("registration {} has waitlist position 0", self.id))
            }
            (RegistrationStatus::Waitlist, Some(_)) => Ok(()),
            (RegistrationStatus::Waitlist, None) => {
                Err(format!("registration {} is waitlisted without a position", self.id))
            }
            (status, Some(position)) => Err(format!(
                "registration {} is {status} but holds waitlist position {position}",
                self.id
            )),
            (_, None) => Ok(()),
        }
    }

    fn place(&mut self, placement: Placement, now: DateTime<Utc>) {
        match placement {
            Placement::Confirmed => {
                self.status = RegistrationStatus::Confirmed;
                self.waitlist_position = None;
                self.confirmed_at = Some(now);
            }
            Placement::Waitlisted { position } => {
                self.status = RegistrationStatus::Waitlist;
                self.waitlist_position = Some(position);
            }
        }
    }
}
