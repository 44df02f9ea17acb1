//! PostgreSQL implementation of the record accessors.
//!
//! Row locks do all the concurrency work: `FOR UPDATE` on the event row
//! serializes every registration and cancellation on the event,
//! `FOR UPDATE` on a registration row pins the row being cancelled, and
//! the promotion search uses `FOR UPDATE SKIP LOCKED` so it never waits
//! on a candidate held elsewhere.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};

use super::models::{
    EventRow, RegistrationCounts, RegistrationRow, event_from_row, from_db_count,
    registration_from_row, to_db_int,
};
use super::{EventAccessor, RegistrationAccessor, RegistrationStore, StoreError, StoreTransaction};
use crate::config::AppConfig;
use crate::domain::{Event, EventId, EventStatus, Registration, RegistrationId, UserId};

/// PostgreSQL-backed registration store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wraps an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool sized from the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the database is unreachable.
    pub async fn connect(config: &AppConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Applies pending migrations from `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Migrate`] if a migration cannot be read or
    /// fails to apply.
    pub async fn migrate(&self, dir: &Path) -> Result<(), StoreError> {
        let migrator = sqlx::migrate::Migrator::new(dir).await?;
        migrator.run(&self.pool).await?;
        Ok(())
    }

    /// Returns the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// An open PostgreSQL transaction. Rolled back on drop unless
/// committed.
pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

impl fmt::Debug for PgTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgTransaction").finish_non_exhaustive()
    }
}

impl RegistrationStore for PgStore {
    type Tx = PgTransaction;

    async fn begin(&self) -> Result<PgTransaction, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(PgTransaction { tx })
    }

    async fn find_event(&self, id: EventId) -> Result<Option<Event>, StoreError> {
        sqlx::query_as::<_, EventRow>(
            "SELECT id, host_id, title, capacity, status, starts_at, created_at, updated_at \
             FROM events WHERE id = $1",
        )
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .map(event_from_row)
        .transpose()
    }

    async fn find_registration(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<Option<Registration>, StoreError> {
        sqlx::query_as::<_, RegistrationRow>(
            "SELECT id, event_id, user_id, status, waitlist_position, registered_at, confirmed_at, cancelled_at \
             FROM registrations WHERE event_id = $1 AND user_id = $2",
        )
        .bind(*event_id.as_uuid())
        .bind(*user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .map(registration_from_row)
        .transpose()
    }

    async fn event_registrations(
        &self,
        event_id: EventId,
    ) -> Result<Vec<Registration>, StoreError> {
        sqlx::query_as::<_, RegistrationRow>(
            "SELECT id, event_id, user_id, status, waitlist_position, registered_at, confirmed_at, cancelled_at \
             FROM registrations \
             WHERE event_id = $1 AND status <> 'cancelled' \
             ORDER BY CASE status WHEN 'confirmed' THEN 0 ELSE 1 END, \
                      waitlist_position ASC, registered_at ASC",
        )
        .bind(*event_id.as_uuid())
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(registration_from_row)
        .collect()
    }

    async fn user_registrations(&self, user_id: UserId) -> Result<Vec<Registration>, StoreError> {
        sqlx::query_as::<_, RegistrationRow>(
            "SELECT id, event_id, user_id, status, waitlist_position, registered_at, confirmed_at, cancelled_at \
             FROM registrations \
             WHERE user_id = $1 AND status <> 'cancelled' \
             ORDER BY registered_at DESC",
        )
        .bind(*user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(registration_from_row)
        .collect()
    }

    async fn hosted_events(&self, host_id: UserId) -> Result<Vec<Event>, StoreError> {
        sqlx::query_as::<_, EventRow>(
            "SELECT id, host_id, title, capacity, status, starts_at, created_at, updated_at \
             FROM events WHERE host_id = $1 \
             ORDER BY starts_at DESC, created_at DESC",
        )
        .bind(*host_id.as_uuid())
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(event_from_row)
        .collect()
    }

    async fn registration_counts(
        &self,
        event_id: EventId,
    ) -> Result<RegistrationCounts, StoreError> {
        let (confirmed, waitlisted) = sqlx::query_as::<_, (i64, i64)>(
            "SELECT COUNT(*) FILTER (WHERE status = 'confirmed'), \
                    COUNT(*) FILTER (WHERE status = 'waitlist') \
             FROM registrations WHERE event_id = $1",
        )
        .bind(*event_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;

        Ok(RegistrationCounts {
            confirmed: from_db_count(confirmed)?,
            waitlisted: from_db_count(waitlisted)?,
        })
    }
}

impl EventAccessor for PgTransaction {
    async fn lock_event(&mut self, id: EventId) -> Result<Option<Event>, StoreError> {
        sqlx::query_as::<_, EventRow>(
            "SELECT id, host_id, title, capacity, status, starts_at, created_at, updated_at \
             FROM events WHERE id = $1 FOR UPDATE",
        )
        .bind(*id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?
        .map(event_from_row)
        .transpose()
    }

    async fn find_event(&mut self, id: EventId) -> Result<Option<Event>, StoreError> {
        sqlx::query_as::<_, EventRow>(
            "SELECT id, host_id, title, capacity, status, starts_at, created_at, updated_at \
             FROM events WHERE id = $1",
        )
        .bind(*id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?
        .map(event_from_row)
        .transpose()
    }

    async fn insert_event(&mut self, event: &Event) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO events (id, host_id, title, capacity, status, starts_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(*event.id.as_uuid())
        .bind(*event.host_id.as_uuid())
        .bind(event.title.as_str())
        .bind(to_db_int(event.capacity)?)
        .bind(event.status.as_str())
        .bind(event.starts_at)
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_event_status(
        &mut self,
        id: EventId,
        status: EventStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE events SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(*id.as_uuid())
            .bind(status.as_str())
            .bind(at)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RowMissing {
                table: "events",
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

impl RegistrationAccessor for PgTransaction {
    async fn lock_registration(
        &mut self,
        id: RegistrationId,
    ) -> Result<Option<Registration>, StoreError> {
        sqlx::query_as::<_, RegistrationRow>(
            "SELECT id, event_id, user_id, status, waitlist_position, registered_at, confirmed_at, cancelled_at \
             FROM registrations WHERE id = $1 FOR UPDATE",
        )
        .bind(*id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?
        .map(registration_from_row)
        .transpose()
    }

    async fn find_by_event_and_user(
        &mut self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<Option<Registration>, StoreError> {
        sqlx::query_as::<_, RegistrationRow>(
            "SELECT id, event_id, user_id, status, waitlist_position, registered_at, confirmed_at, cancelled_at \
             FROM registrations WHERE event_id = $1 AND user_id = $2",
        )
        .bind(*event_id.as_uuid())
        .bind(*user_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?
        .map(registration_from_row)
        .transpose()
    }

    async fn count_confirmed(&mut self, event_id: EventId) -> Result<u32, StoreError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM registrations WHERE event_id = $1 AND status = 'confirmed'",
        )
        .bind(*event_id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await?;
        from_db_count(count)
    }

    async fn max_waitlist_position(
        &mut self,
        event_id: EventId,
    ) -> Result<Option<u32>, StoreError> {
        let max = sqlx::query_scalar::<_, Option<i32>>(
            "SELECT MAX(waitlist_position) FROM registrations \
             WHERE event_id = $1 AND status = 'waitlist'",
        )
        .bind(*event_id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await?;

        max.map(|p| {
            u32::try_from(p).map_err(|_| {
                StoreError::Corrupt(format!("event {event_id} has waitlist position {p}"))
            })
        })
        .transpose()
    }

    async fn insert_registration(&mut self, registration: &Registration) -> Result<(), StoreError> {
        let position = registration.waitlist_position.map(to_db_int).transpose()?;
        sqlx::query(
            "INSERT INTO registrations \
             (id, event_id, user_id, status, waitlist_position, registered_at, confirmed_at, cancelled_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(*registration.id.as_uuid())
        .bind(*registration.event_id.as_uuid())
        .bind(*registration.user_id.as_uuid())
        .bind(registration.status.as_str())
        .bind(position)
        .bind(registration.registered_at)
        .bind(registration.confirmed_at)
        .bind(registration.cancelled_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_registration(&mut self, registration: &Registration) -> Result<(), StoreError> {
        let position = registration.waitlist_position.map(to_db_int).transpose()?;
        let result = sqlx::query(
            "UPDATE registrations \
             SET status = $2, waitlist_position = $3, registered_at = $4, \
                 confirmed_at = $5, cancelled_at = $6 \
             WHERE id = $1",
        )
        .bind(*registration.id.as_uuid())
        .bind(registration.status.as_str())
        .bind(position)
        .bind(registration.registered_at)
        .bind(registration.confirmed_at)
        .bind(registration.cancelled_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RowMissing {
                table: "registrations",
                id: registration.id.to_string(),
            });
        }
        Ok(())
    }

    async fn first_waitlisted_skip_locked(
        &mut self,
        event_id: EventId,
    ) -> Result<Option<Registration>, StoreError> {
        sqlx::query_as::<_, RegistrationRow>(
            "SELECT id, event_id, user_id, status, waitlist_position, registered_at, confirmed_at, cancelled_at \
             FROM registrations \
             WHERE event_id = $1 AND status = 'waitlist' \
             ORDER BY waitlist_position ASC \
             LIMIT 1 \
             FOR UPDATE SKIP LOCKED",
        )
        .bind(*event_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?
        .map(registration_from_row)
        .transpose()
    }

    async fn close_waitlist_gap(
        &mut self,
        event_id: EventId,
        above: u32,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE registrations SET waitlist_position = waitlist_position - 1 \
             WHERE event_id = $1 AND status = 'waitlist' AND waitlist_position > $2",
        )
        .bind(*event_id.as_uuid())
        .bind(to_db_int(above)?)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn cancel_active_for_event(
        &mut self,
        event_id: EventId,
        at: DateTime<Utc>,
    ) -> Result<Vec<Registration>, StoreError> {
        // The CTE snapshot returns each row as it was before the sweep.
        sqlx::query_as::<_, RegistrationRow>(
            "WITH swept AS ( \
                 SELECT id, event_id, user_id, status, waitlist_position, registered_at, confirmed_at, cancelled_at \
                 FROM registrations \
                 WHERE event_id = $1 AND status <> 'cancelled' \
                 FOR UPDATE \
             ), updated AS ( \
                 UPDATE registrations r \
                 SET status = 'cancelled', waitlist_position = NULL, cancelled_at = $2 \
                 FROM swept WHERE r.id = swept.id \
             ) \
             SELECT id, event_id, user_id, status, waitlist_position, registered_at, confirmed_at, cancelled_at \
             FROM swept",
        )
        .bind(*event_id.as_uuid())
        .bind(at)
        .fetch_all(&mut *self.tx)
        .await?
        .into_iter()
        .map(registration_from_row)
        .collect()
    }
}

impl StoreTransaction for PgTransaction {
    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}
