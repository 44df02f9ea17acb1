//! Persistence layer: the event and registration record accessors.
//!
//! The registration engine is written once against the accessor traits
//! in this module and runs unchanged on PostgreSQL ([`PgStore`]) and on
//! the in-process [`MemoryStore`].
//!
//! A transaction is obtained from [`RegistrationStore::begin`]. Its
//! writes become visible atomically on [`StoreTransaction::commit`];
//! dropping it without committing rolls everything back.

pub mod memory;
pub mod models;
pub mod postgres;

use std::fmt;
use std::future::Future;

use chrono::{DateTime, Utc};

use crate::domain::{Event, EventId, EventStatus, Registration, RegistrationId, UserId};

pub use memory::MemoryStore;
pub use models::RegistrationCounts;
pub use postgres::PgStore;

/// Storage failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Driver or database failure: connection loss, lock timeout,
    /// constraint violation, serialization failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed at startup.
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// A stored row violates a model invariant.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// A row the transaction just read has disappeared.
    #[error("{table} row {id} not found")]
    RowMissing {
        /// Table name.
        table: &'static str,
        /// Primary key.
        id: String,
    },
}

/// Reads, locks and updates event rows inside a transaction.
pub trait EventAccessor: Send {
    /// Reads the event and locks its row until the transaction ends.
    ///
    /// This is the serialization point for every registration change
    /// on the event.
    fn lock_event(
        &mut self,
        id: EventId,
    ) -> impl Future<Output = Result<Option<Event>, StoreError>> + Send;

    /// Reads the event without locking it.
    fn find_event(
        &mut self,
        id: EventId,
    ) -> impl Future<Output = Result<Option<Event>, StoreError>> + Send;

    /// Inserts a new event row.
    fn insert_event(
        &mut self,
        event: &Event,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Sets the event status and bumps `updated_at`.
    fn update_event_status(
        &mut self,
        id: EventId,
        status: EventStatus,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Reads, creates and updates registration rows inside a transaction.
pub trait RegistrationAccessor: Send {
    /// Reads the registration and locks its row until the transaction
    /// ends.
    fn lock_registration(
        &mut self,
        id: RegistrationId,
    ) -> impl Future<Output = Result<Option<Registration>, StoreError>> + Send;

    /// Finds the (single) registration row for a user and event,
    /// whether active or cancelled.
    fn find_by_event_and_user(
        &mut self,
        event_id: EventId,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<Registration>, StoreError>> + Send;

    /// Counts confirmed registrations for the event.
    fn count_confirmed(
        &mut self,
        event_id: EventId,
    ) -> impl Future<Output = Result<u32, StoreError>> + Send;

    /// Highest waitlist position for the event, `None` when the
    /// waitlist is empty.
    fn max_waitlist_position(
        &mut self,
        event_id: EventId,
    ) -> impl Future<Output = Result<Option<u32>, StoreError>> + Send;

    /// Inserts a new registration row.
    fn insert_registration(
        &mut self,
        registration: &Registration,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Writes status, waitlist position and timestamps of an existing
    /// registration row.
    fn update_registration(
        &mut self,
        registration: &Registration,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Selects and locks the waitlisted registration with the lowest
    /// position, skipping rows locked by other transactions.
    fn first_waitlisted_skip_locked(
        &mut self,
        event_id: EventId,
    ) -> impl Future<Output = Result<Option<Registration>, StoreError>> + Send;

    /// Decrements every waitlist position strictly greater than `above`,
    /// returning the number of rows shifted.
    fn close_waitlist_gap(
        &mut self,
        event_id: EventId,
        above: u32,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Cancels every active registration for the event, returning the
    /// rows as they were before the sweep.
    fn cancel_active_for_event(
        &mut self,
        event_id: EventId,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Registration>, StoreError>> + Send;
}

/// An open store transaction spanning both accessors.
pub trait StoreTransaction: EventAccessor + RegistrationAccessor {
    /// Commits every write made through this transaction.
    fn commit(self) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// A transactional registration datastore.
pub trait RegistrationStore: Send + Sync + fmt::Debug + 'static {
    /// Transaction type handed out by [`Self::begin`].
    type Tx: StoreTransaction;

    /// Opens a new transaction.
    fn begin(&self) -> impl Future<Output = Result<Self::Tx, StoreError>> + Send;

    /// Reads an event outside any transaction.
    fn find_event(
        &self,
        id: EventId,
    ) -> impl Future<Output = Result<Option<Event>, StoreError>> + Send;

    /// Reads a user's registration row for an event, active or
    /// cancelled.
    fn find_registration(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<Registration>, StoreError>> + Send;

    /// Active registrations for an event: confirmed first, then the
    /// waitlist in position order.
    fn event_registrations(
        &self,
        event_id: EventId,
    ) -> impl Future<Output = Result<Vec<Registration>, StoreError>> + Send;

    /// A user's active registrations, newest first.
    fn user_registrations(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<Registration>, StoreError>> + Send;

    /// Every event hosted by the user, whatever its status, latest start
    /// time first.
    fn hosted_events(
        &self,
        host_id: UserId,
    ) -> impl Future<Output = Result<Vec<Event>, StoreError>> + Send;

    /// Confirmed and waitlisted counts for an event.
    fn registration_counts(
        &self,
        event_id: EventId,
    ) -> impl Future<Output = Result<RegistrationCounts, StoreError>> + Send;
}
