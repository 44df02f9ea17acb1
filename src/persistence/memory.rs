//! In-process registration store.
//!
//! Used when persistence is disabled and throughout the test suite.
//! Every transaction holds one async mutex for its whole lifetime and
//! works on a private copy of the tables, which replaces the shared copy
//! on commit. Transactions are therefore strictly serialized, a dropped
//! transaction leaves no trace, and the skip-locked promotion search can
//! never meet a row locked by someone else.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::models::RegistrationCounts;
use super::{EventAccessor, RegistrationAccessor, RegistrationStore, StoreError, StoreTransaction};
use crate::domain::{
    Event, EventId, EventStatus, Registration, RegistrationId, RegistrationStatus, UserId,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    events: HashMap<EventId, Event>,
    registrations: HashMap<RegistrationId, Registration>,
}

impl Tables {
    fn for_event(&self, event_id: EventId) -> impl Iterator<Item = &Registration> {
        self.registrations
            .values()
            .filter(move |r| r.event_id == event_id)
    }

    fn find_by_event_and_user(&self, event_id: EventId, user_id: UserId) -> Option<Registration> {
        self.for_event(event_id)
            .find(|r| r.user_id == user_id)
            .cloned()
    }

    fn count(&self, event_id: EventId, status: RegistrationStatus) -> u32 {
        let count = self.for_event(event_id).filter(|r| r.status == status).count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }
}

/// Mutex-guarded in-memory tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every registration row for an event, cancelled ones included.
    ///
    /// Test and diagnostics helper; not part of the store contract.
    pub async fn all_registrations(&self, event_id: EventId) -> Vec<Registration> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<Registration> = tables.for_event(event_id).cloned().collect();
        rows.sort_by_key(|r| (r.registered_at, r.id));
        rows
    }
}

/// An open in-memory transaction. Rolled back on drop unless committed.
#[derive(Debug)]
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

impl RegistrationStore for MemoryStore {
    type Tx = MemoryTransaction;

    async fn begin(&self) -> Result<MemoryTransaction, StoreError> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let working = guard.clone();
        Ok(MemoryTransaction { guard, working })
    }

    async fn find_event(&self, id: EventId) -> Result<Option<Event>, StoreError> {
        Ok(self.tables.lock().await.events.get(&id).cloned())
    }

    async fn find_registration(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<Option<Registration>, StoreError> {
        Ok(self
            .tables
            .lock()
            .await
            .find_by_event_and_user(event_id, user_id))
    }

    async fn event_registrations(
        &self,
        event_id: EventId,
    ) -> Result<Vec<Registration>, StoreError> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<Registration> = tables
            .for_event(event_id)
            .filter(|r| r.is_active())
            .cloned()
            .collect();
        rows.sort_by_key(|r| {
            (
                r.status != RegistrationStatus::Confirmed,
                r.waitlist_position,
                r.registered_at,
            )
        });
        Ok(rows)
    }

    async fn user_registrations(&self, user_id: UserId) -> Result<Vec<Registration>, StoreError> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<Registration> = tables
            .registrations
            .values()
            .filter(|r| r.user_id == user_id && r.is_active())
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.registered_at.cmp(&a.registered_at));
        Ok(rows)
    }

    async fn hosted_events(&self, host_id: UserId) -> Result<Vec<Event>, StoreError> {
        let tables = self.tables.lock().await;
        let mut events: Vec<Event> = tables
            .events
            .values()
            .filter(|e| e.host_id == host_id)
            .cloned()
            .collect();
        events.sort_by(|a, b| (b.starts_at, b.created_at).cmp(&(a.starts_at, a.created_at)));
        Ok(events)
    }

    async fn registration_counts(
        &self,
        event_id: EventId,
    ) -> Result<RegistrationCounts, StoreError> {
        let tables = self.tables.lock().await;
        Ok(RegistrationCounts {
            confirmed: tables.count(event_id, RegistrationStatus::Confirmed),
            waitlisted: tables.count(event_id, RegistrationStatus::Waitlist),
        })
    }
}

impl EventAccessor for MemoryTransaction {
    async fn lock_event(&mut self, id: EventId) -> Result<Option<Event>, StoreError> {
        Ok(self.working.events.get(&id).cloned())
    }

    async fn find_event(&mut self, id: EventId) -> Result<Option<Event>, StoreError> {
        Ok(self.working.events.get(&id).cloned())
    }

    async fn insert_event(&mut self, event: &Event) -> Result<(), StoreError> {
        if self.working.events.contains_key(&event.id) {
            return Err(StoreError::Corrupt(format!("event {} already exists", event.id)));
        }
        self.working.events.insert(event.id, event.clone());
        Ok(())
    }

    async fn update_event_status(
        &mut self,
        id: EventId,
        status: EventStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let event = self
            .working
            .events
            .get_mut(&id)
            .ok_or_else(|| StoreError::RowMissing {
                table: "events",
                id: id.to_string(),
            })?;
        event.status = status;
        event.updated_at = at;
        Ok(())
    }
}

impl RegistrationAccessor for MemoryTransaction {
    async fn lock_registration(
        &mut self,
        id: RegistrationId,
    ) -> Result<Option<Registration>, StoreError> {
        Ok(self.working.registrations.get(&id).cloned())
    }

    async fn find_by_event_and_user(
        &mut self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<Option<Registration>, StoreError> {
        Ok(self.working.find_by_event_and_user(event_id, user_id))
    }

    async fn count_confirmed(&mut self, event_id: EventId) -> Result<u32, StoreError> {
        Ok(self.working.count(event_id, RegistrationStatus::Confirmed))
    }

    async fn max_waitlist_position(
        &mut self,
        event_id: EventId,
    ) -> Result<Option<u32>, StoreError> {
        Ok(self
            .working
            .for_event(event_id)
            .filter(|r| r.status == RegistrationStatus::Waitlist)
            .filter_map(|r| r.waitlist_position)
            .max())
    }

    async fn insert_registration(&mut self, registration: &Registration) -> Result<(), StoreError> {
        // Mirrors the UNIQUE (event_id, user_id) constraint.
        if self
            .working
            .find_by_event_and_user(registration.event_id, registration.user_id)
            .is_some()
        {
            return Err(StoreError::Corrupt(format!(
                "duplicate registration for event {} and user {}",
                registration.event_id, registration.user_id
            )));
        }
        self.working
            .registrations
            .insert(registration.id, registration.clone());
        Ok(())
    }

    async fn update_registration(&mut self, registration: &Registration) -> Result<(), StoreError> {
        let row = self
            .working
            .registrations
            .get_mut(&registration.id)
            .ok_or_else(|| StoreError::RowMissing {
                table: "registrations",
                id: registration.id.to_string(),
            })?;
        *row = registration.clone();
        Ok(())
    }

    async fn first_waitlisted_skip_locked(
        &mut self,
        event_id: EventId,
    ) -> Result<Option<Registration>, StoreError> {
        Ok(self
            .working
            .for_event(event_id)
            .filter(|r| r.status == RegistrationStatus::Waitlist)
            .min_by_key(|r| r.waitlist_position)
            .cloned())
    }

    async fn close_waitlist_gap(
        &mut self,
        event_id: EventId,
        above: u32,
    ) -> Result<u64, StoreError> {
        let mut shifted = 0;
        for row in self.working.registrations.values_mut() {
            if row.event_id != event_id || row.status != RegistrationStatus::Waitlist {
                continue;
            }
            if let Some(position) = row.waitlist_position.as_mut()
                && *position > above
            {
                *position -= 1;
                shifted += 1;
            }
        }
        Ok(shifted)
    }

    async fn cancel_active_for_event(
        &mut self,
        event_id: EventId,
        at: DateTime<Utc>,
    ) -> Result<Vec<Registration>, StoreError> {
        let mut swept = Vec::new();
        for row in self.working.registrations.values_mut() {
            if row.event_id != event_id || !row.is_active() {
                continue;
            }
            swept.push(row.clone());
            row.status = RegistrationStatus::Cancelled;
            row.waitlist_position = None;
            row.cancelled_at = Some(at);
        }
        Ok(swept)
    }
}

impl StoreTransaction for MemoryTransaction {
    async fn commit(mut self) -> Result<(), StoreError> {
        *self.guard = std::mem::take(&mut self.working);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::Placement;

    fn make_event() -> Event {
        Event::new(UserId::new(), "Ladder night".to_string(), 2, Utc::now(), Utc::now())
    }

    async fn seed(store: &MemoryStore, event: &Event, regs: &[Registration]) {
        let Ok(mut tx) = store.begin().await else {
            panic!("begin failed");
        };
        let Ok(()) = tx.insert_event(event).await else {
            panic!("insert event failed");
        };
        for reg in regs {
            let Ok(()) = tx.insert_registration(reg).await else {
                panic!("insert registration failed");
            };
        }
        let Ok(()) = tx.commit().await else {
            panic!("commit failed");
        };
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let store = MemoryStore::new();
        let event = make_event();
        {
            let Ok(mut tx) = store.begin().await else {
                panic!("begin failed");
            };
            let _ = tx.insert_event(&event).await;
        }
        let found = store.find_event(event.id).await;
        assert!(matches!(found, Ok(None)));
    }

    #[tokio::test]
    async fn commit_publishes_writes() {
        let store = MemoryStore::new();
        let event = make_event();
        seed(&store, &event, &[]).await;

        let Ok(Some(found)) = store.find_event(event.id).await else {
            panic!("event missing");
        };
        assert_eq!(found, event);
    }

    #[tokio::test]
    async fn duplicate_event_user_pair_is_rejected() {
        let store = MemoryStore::new();
        let event = make_event();
        let user = UserId::new();
        let first = Registration::new(event.id, user, Placement::Confirmed, Utc::now());
        seed(&store, &event, &[first]).await;

        let Ok(mut tx) = store.begin().await else {
            panic!("begin failed");
        };
        let second = Registration::new(event.id, user, Placement::Confirmed, Utc::now());
        assert!(tx.insert_registration(&second).await.is_err());
    }

    #[tokio::test]
    async fn close_waitlist_gap_shifts_only_later_positions() {
        let store = MemoryStore::new();
        let event = make_event();
        let regs: Vec<Registration> = (1..=3)
            .map(|p| {
                Registration::new(
                    event.id,
                    UserId::new(),
                    Placement::Waitlisted { position: p },
                    Utc::now(),
                )
            })
            .collect();
        seed(&store, &event, &regs).await;

        let Ok(mut tx) = store.begin().await else {
            panic!("begin failed");
        };
        let Ok(shifted) = tx.close_waitlist_gap(event.id, 1).await else {
            panic!("shift failed");
        };
        assert_eq!(shifted, 2);
        let Ok(()) = tx.commit().await else {
            panic!("commit failed");
        };

        let rows = store.all_registrations(event.id).await;
        let mut positions: Vec<Option<u32>> = rows.iter().map(|r| r.waitlist_position).collect();
        positions.sort();
        assert_eq!(positions, vec![Some(1), Some(1), Some(2)]);
    }

    #[tokio::test]
    async fn roster_lists_confirmed_before_waitlist() {
        let store = MemoryStore::new();
        let event = make_event();
        let waitlisted = Registration::new(
            event.id,
            UserId::new(),
            Placement::Waitlisted { position: 1 },
            Utc::now(),
        );
        let confirmed =
            Registration::new(event.id, UserId::new(), Placement::Confirmed, Utc::now());
        seed(&store, &event, &[waitlisted.clone(), confirmed.clone()]).await;

        let Ok(rows) = store.event_registrations(event.id).await else {
            panic!("query failed");
        };
        let ids: Vec<RegistrationId> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![confirmed.id, waitlisted.id]);

        let Ok(counts) = store.registration_counts(event.id).await else {
            panic!("count failed");
        };
        assert_eq!(counts.confirmed, 1);
        assert_eq!(counts.waitlisted, 1);
    }

    #[tokio::test]
    async fn hosted_events_lists_latest_first() {
        let store = MemoryStore::new();
        let host = UserId::new();
        let now = Utc::now();
        let next_week = now + chrono::Duration::days(7);
        let earlier = Event::new(host, "Warm-up".to_string(), 2, now, now);
        let later = Event::new(host, "Finals".to_string(), 2, next_week, now);
        let foreign = make_event();
        seed(&store, &earlier, &[]).await;
        seed(&store, &later, &[]).await;
        seed(&store, &foreign, &[]).await;

        let Ok(hosted) = store.hosted_events(host).await else {
            panic!("query failed");
        };
        let ids: Vec<EventId> = hosted.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![later.id, earlier.id]);
    }

    #[tokio::test]
    async fn sweep_cancels_every_active_row() {
        let store = MemoryStore::new();
        let event = make_event();
        let regs = [
            Registration::new(event.id, UserId::new(), Placement::Confirmed, Utc::now()),
            Registration::new(
                event.id,
                UserId::new(),
                Placement::Waitlisted { position: 1 },
                Utc::now(),
            ),
        ];
        seed(&store, &event, &regs).await;

        let Ok(mut tx) = store.begin().await else {
            panic!("begin failed");
        };
        let Ok(swept) = tx.cancel_active_for_event(event.id, Utc::now()).await else {
            panic!("sweep failed");
        };
        assert_eq!(swept.len(), 2);
        let Ok(()) = tx.commit().await else {
            panic!("commit failed");
        };

        let rows = store.all_registrations(event.id).await;
        assert!(rows.iter().all(|r| !r.is_active() && r.waitlist_position.is_none()));
    }
}
