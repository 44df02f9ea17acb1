//! Registration service: owns transactions around the engine protocols
//! and runs the post-commit work.
//!
//! Every mutation follows the same shape: begin → engine protocol →
//! commit → refresh event status → dispatch notifications. Work after
//! the commit is best-effort; its failures are logged and never change
//! the result returned to the caller.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;

use super::registration_engine::{self, CancelOutcome};
use crate::domain::event::MAX_TITLE_LEN;
use crate::domain::{
    Event, EventId, EventStatus, EventSummary, NotificationDispatcher, Registration,
    RegistrationEvent, RegistrationId, UserId,
};
use crate::error::RegistrationError;
use crate::persistence::{EventAccessor, RegistrationAccessor, RegistrationStore, StoreTransaction};

/// Input for [`RegistrationService::create_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    /// Display title, 1 to 200 characters after trimming.
    pub title: String,
    /// Number of confirmed slots, at least 1.
    pub capacity: u32,
    /// When the event takes place.
    pub starts_at: DateTime<Utc>,
}

impl NewEvent {
    fn validate(&self) -> Result<(), RegistrationError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(RegistrationError::InvalidInput(
                "title must not be empty".to_string(),
            ));
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(RegistrationError::InvalidInput(format!(
                "title must be at most {MAX_TITLE_LEN} characters"
            )));
        }
        if self.capacity == 0 {
            return Err(RegistrationError::InvalidInput(
                "capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Transaction-owning facade over the registration engine.
pub struct RegistrationService<S> {
    store: S,
    dispatcher: Arc<dyn NotificationDispatcher>,
}

impl<S: fmt::Debug> fmt::Debug for RegistrationService<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationService")
            .field("store", &self.store)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

impl<S: RegistrationStore> RegistrationService<S> {
    /// Creates a new service over `store`, dispatching post-commit events
    /// to `dispatcher`.
    #[must_use]
    pub fn new(store: S, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        Self { store, dispatcher }
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Registers `user_id` for `event_id`.
    ///
    /// # Errors
    ///
    /// Returns the [`RegistrationError`] raised by the register protocol;
    /// nothing is written in that case.
    pub async fn register(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<Registration, RegistrationError> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let registration = registration_engine::register(&mut tx, event_id, user_id, now).await?;
        tx.commit().await?;

        tracing::info!(
            %event_id,
            %user_id,
            registration_id = %registration.id,
            status = %registration.status,
            position = ?registration.waitlist_position,
            "registered"
        );

        self.refresh_event_status_logged(event_id).await;
        self.notify(vec![RegistrationEvent::Registered {
            event_id,
            user_id,
            registration_id: registration.id,
            status: registration.status,
            waitlist_position: registration.waitlist_position,
            timestamp: now,
        }]);
        Ok(registration)
    }

    /// Cancels the user's active registration for the event, promoting
    /// the head of the waitlist when a confirmed slot frees up.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::RegistrationNotFound`] if the user
    /// never registered, [`RegistrationError::AlreadyCancelled`] if the
    /// registration is already cancelled, and
    /// [`RegistrationError::Internal`] on storage failure.
    pub async fn cancel_registration(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<CancelOutcome, RegistrationError> {
        let registration = self
            .store
            .find_registration(event_id, user_id)
            .await?
            .ok_or(RegistrationError::RegistrationNotFound)?;
        self.cancel_and_promote(registration.id, event_id).await
    }

    /// Cancels a registration by ID and promotes the head of the
    /// waitlist when a confirmed slot frees up.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::EventNotFound`] if the event does not
    /// exist, [`RegistrationError::RegistrationNotFound`] if the
    /// registration does not exist for this event,
    /// [`RegistrationError::AlreadyCancelled`] if it is already
    /// cancelled, and [`RegistrationError::Internal`] on storage failure.
    pub async fn cancel_and_promote(
        &self,
        registration_id: RegistrationId,
        event_id: EventId,
    ) -> Result<CancelOutcome, RegistrationError> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let outcome =
            registration_engine::cancel_and_promote(&mut tx, registration_id, event_id, now).await?;
        tx.commit().await?;

        let cancelled = &outcome.cancelled;
        tracing::info!(
            %event_id,
            user_id = %cancelled.user_id,
            %registration_id,
            promoted = ?outcome.promoted.as_ref().map(|p| p.user_id),
            "registration cancelled"
        );

        self.refresh_event_status_logged(event_id).await;

        let mut events = vec![RegistrationEvent::RegistrationCancelled {
            event_id,
            user_id: cancelled.user_id,
            registration_id,
            timestamp: now,
        }];
        if let Some(promoted) = &outcome.promoted {
            events.push(RegistrationEvent::WaitlistPromoted {
                event_id,
                user_id: promoted.user_id,
                registration_id: promoted.id,
                event_label: self.event_label(event_id).await,
                timestamp: now,
            });
        }
        self.notify(events);
        Ok(outcome)
    }

    /// Recomputes the cached `open`/`full` status of an event from its
    /// confirmed count, returning the status now stored.
    ///
    /// Cancelled and completed events are left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::EventNotFound`] if the event does not
    /// exist and [`RegistrationError::Internal`] on storage failure.
    pub async fn refresh_event_status(
        &self,
        event_id: EventId,
    ) -> Result<EventStatus, RegistrationError> {
        let mut tx = self.store.begin().await?;
        let event = tx
            .lock_event(event_id)
            .await?
            .ok_or(RegistrationError::EventNotFound(event_id))?;
        let confirmed = tx.count_confirmed(event_id).await?;
        let next = event.status.derived(confirmed, event.capacity);
        if next == event.status {
            return Ok(next);
        }
        tx.update_event_status(event_id, next, Utc::now()).await?;
        tx.commit().await?;

        tracing::info!(
            %event_id,
            from = %event.status,
            to = %next,
            confirmed,
            "event status refreshed"
        );
        Ok(next)
    }

    /// Creates a new `open` event hosted by `host_id`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::InvalidInput`] for an empty or
    /// overlong title or a zero capacity, and
    /// [`RegistrationError::Internal`] on storage failure.
    pub async fn create_event(
        &self,
        host_id: UserId,
        input: NewEvent,
    ) -> Result<Event, RegistrationError> {
        input.validate()?;
        let event = Event::new(
            host_id,
            input.title.trim().to_string(),
            input.capacity,
            input.starts_at,
            Utc::now(),
        );

        let mut tx = self.store.begin().await?;
        tx.insert_event(&event).await?;
        tx.commit().await?;

        tracing::info!(event_id = %event.id, %host_id, capacity = event.capacity, "event created");
        Ok(event)
    }

    /// Cancels an event on behalf of its host and sweeps every active
    /// registration, returning the registrations as they were before
    /// the sweep.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::EventNotFound`] if the event does not exist.
    /// - [`RegistrationError::NotEventHost`] if `requested_by` is not the
    ///   host.
    /// - [`RegistrationError::EventNotOpen`] if it is already cancelled or
    ///   completed.
    /// - [`RegistrationError::Internal`] on storage failure.
    pub async fn cancel_event(
        &self,
        event_id: EventId,
        requested_by: UserId,
    ) -> Result<Vec<Registration>, RegistrationError> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let event = tx
            .lock_event(event_id)
            .await?
            .ok_or(RegistrationError::EventNotFound(event_id))?;
        if !event.is_hosted_by(requested_by) {
            return Err(RegistrationError::NotEventHost(event_id));
        }
        if !event.status.accepts_registrations() {
            return Err(RegistrationError::EventNotOpen(event_id));
        }

        tx.update_event_status(event_id, EventStatus::Cancelled, now)
            .await?;
        let swept = tx.cancel_active_for_event(event_id, now).await?;
        tx.commit().await?;

        tracing::info!(%event_id, swept = swept.len(), "event cancelled");

        let event_label = event.label();
        self.notify(
            swept
                .iter()
                .map(|r| RegistrationEvent::EventCancelled {
                    event_id,
                    user_id: r.user_id,
                    event_label: event_label.clone(),
                    timestamp: now,
                })
                .collect(),
        );
        Ok(swept)
    }

    /// Returns the event with its live confirmed and waitlist counts.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::EventNotFound`] if the event does not
    /// exist and [`RegistrationError::Internal`] on storage failure.
    pub async fn event_summary(
        &self,
        event_id: EventId,
    ) -> Result<EventSummary, RegistrationError> {
        let event = self
            .store
            .find_event(event_id)
            .await?
            .ok_or(RegistrationError::EventNotFound(event_id))?;
        let counts = self.store.registration_counts(event_id).await?;
        Ok(EventSummary {
            event,
            confirmed_count: counts.confirmed,
            waitlist_count: counts.waitlisted,
        })
    }

    /// Active registrations for an event: confirmed first, then the
    /// waitlist in position order.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::EventNotFound`] if the event does not
    /// exist and [`RegistrationError::Internal`] on storage failure.
    pub async fn event_registrations(
        &self,
        event_id: EventId,
    ) -> Result<Vec<Registration>, RegistrationError> {
        if self.store.find_event(event_id).await?.is_none() {
            return Err(RegistrationError::EventNotFound(event_id));
        }
        Ok(self.store.event_registrations(event_id).await?)
    }

    /// A user's active registrations, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::Internal`] on storage failure.
    pub async fn user_registrations(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Registration>, RegistrationError> {
        Ok(self.store.user_registrations(user_id).await?)
    }

    /// Events hosted by the user, latest start time first.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::Internal`] on storage failure.
    pub async fn hosted_events(&self, host_id: UserId) -> Result<Vec<Event>, RegistrationError> {
        Ok(self.store.hosted_events(host_id).await?)
    }

    /// The user's registration row for an event, active or cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::RegistrationNotFound`] if the user
    /// never registered and [`RegistrationError::Internal`] on storage
    /// failure.
    pub async fn registration_for(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<Registration, RegistrationError> {
        self.store
            .find_registration(event_id, user_id)
            .await?
            .ok_or(RegistrationError::RegistrationNotFound)
    }

    async fn refresh_event_status_logged(&self, event_id: EventId) {
        if let Err(e) = self.refresh_event_status(event_id).await {
            tracing::warn!(%event_id, error = %e, "event status refresh failed");
        }
    }

    async fn event_label(&self, event_id: EventId) -> String {
        match self.store.find_event(event_id).await {
            Ok(Some(event)) => event.label(),
            Ok(None) => event_id.to_string(),
            Err(e) => {
                tracing::warn!(%event_id, error = %e, "event lookup for label failed");
                event_id.to_string()
            }
        }
    }

    /// Hands committed events to the dispatcher on a detached task, in
    /// order.
    fn notify(&self, events: Vec<RegistrationEvent>) {
        if events.is_empty() {
            return;
        }
        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(async move {
            for event in events {
                let kind = event.event_type_str();
                let user_id = event.user_id();
                if let Err(e) = dispatcher.dispatch(event).await {
                    tracing::warn!(kind, %user_id, error = %e, "notification dispatch failed");
                }
            }
        });
    }
}

/// Object-safe view of [`RegistrationService`] used by the HTTP layer.
pub trait RegistrationApi: Send + Sync + fmt::Debug {
    /// See [`RegistrationService::register`].
    fn register(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> BoxFuture<'_, Result<Registration, RegistrationError>>;

    /// See [`RegistrationService::cancel_registration`].
    fn cancel_registration(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> BoxFuture<'_, Result<CancelOutcome, RegistrationError>>;

    /// See [`RegistrationService::create_event`].
    fn create_event(
        &self,
        host_id: UserId,
        input: NewEvent,
    ) -> BoxFuture<'_, Result<Event, RegistrationError>>;

    /// See [`RegistrationService::cancel_event`].
    fn cancel_event(
        &self,
        event_id: EventId,
        requested_by: UserId,
    ) -> BoxFuture<'_, Result<Vec<Registration>, RegistrationError>>;

    /// See [`RegistrationService::event_summary`].
    fn event_summary(
        &self,
        event_id: EventId,
    ) -> BoxFuture<'_, Result<EventSummary, RegistrationError>>;

    /// See [`RegistrationService::event_registrations`].
    fn event_registrations(
        &self,
        event_id: EventId,
    ) -> BoxFuture<'_, Result<Vec<Registration>, RegistrationError>>;

    /// See [`RegistrationService::user_registrations`].
    fn user_registrations(
        &self,
        user_id: UserId,
    ) -> BoxFuture<'_, Result<Vec<Registration>, RegistrationError>>;

    /// See [`RegistrationService::hosted_events`].
    fn hosted_events(
        &self,
        host_id: UserId,
    ) -> BoxFuture<'_, Result<Vec<Event>, RegistrationError>>;
}

impl<S: RegistrationStore> RegistrationApi for RegistrationService<S> {
    fn register(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> BoxFuture<'_, Result<Registration, RegistrationError>> {
        Box::pin(Self::register(self, event_id, user_id))
    }

    fn cancel_registration(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> BoxFuture<'_, Result<CancelOutcome, RegistrationError>> {
        Box::pin(Self::cancel_registration(self, event_id, user_id))
    }

    fn create_event(
        &self,
        host_id: UserId,
        input: NewEvent,
    ) -> BoxFuture<'_, Result<Event, RegistrationError>> {
        Box::pin(Self::create_event(self, host_id, input))
    }

    fn cancel_event(
        &self,
        event_id: EventId,
        requested_by: UserId,
    ) -> BoxFuture<'_, Result<Vec<Registration>, RegistrationError>> {
        Box::pin(Self::cancel_event(self, event_id, requested_by))
    }

    fn event_summary(
        &self,
        event_id: EventId,
    ) -> BoxFuture<'_, Result<EventSummary, RegistrationError>> {
        Box::pin(Self::event_summary(self, event_id))
    }

    fn event_registrations(
        &self,
        event_id: EventId,
    ) -> BoxFuture<'_, Result<Vec<Registration>, RegistrationError>> {
        Box::pin(Self::event_registrations(self, event_id))
    }

    fn user_registrations(
        &self,
        user_id: UserId,
    ) -> BoxFuture<'_, Result<Vec<Registration>, RegistrationError>> {
        Box::pin(Self::user_registrations(self, user_id))
    }

    fn hosted_events(
        &self,
        host_id: UserId,
    ) -> BoxFuture<'_, Result<Vec<Event>, RegistrationError>> {
        Box::pin(Self::hosted_events(self, host_id))
    }
}
