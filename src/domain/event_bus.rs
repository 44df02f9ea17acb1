//! Broadcast channel for post-commit registration events.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel and is the
//! default [`NotificationDispatcher`]: delivery workers (push, e-mail,
//! in-app inbox) subscribe to it and handle the events they care about.

use futures_util::future::BoxFuture;
use tokio::sync::broadcast;

use super::RegistrationEvent;
use super::dispatcher::{DispatchError, NotificationDispatcher};

/// Broadcast bus for [`RegistrationEvent`]s.
///
/// When the ring buffer is full the oldest events are dropped for
/// lagging receivers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<RegistrationEvent>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of receivers that got the event; with no
    /// receivers the event is silently dropped.
    pub fn publish(&self, event: RegistrationEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Creates a new receiver for all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RegistrationEvent> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl NotificationDispatcher for EventBus {
    fn dispatch(&self, event: RegistrationEvent) -> BoxFuture<'_, Result<(), DispatchError>> {
        Box::pin(async move {
            let delivered = self.publish(event);
            tracing::debug!(delivered, "registration event published");
            Ok(())
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{EventId, RegistrationId, UserId};
    use chrono::Utc;

    fn make_event(event_id: EventId) -> RegistrationEvent {
        RegistrationEvent::RegistrationCancelled {
            event_id,
            user_id: UserId::new(),
            registration_id: RegistrationId::new(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn publish_without_receivers_returns_zero() {
        let bus = EventBus::new(16);
        assert_eq!(bus.publish(make_event(EventId::new())), 0);
    }

    #[tokio::test]
    async fn subscribers_receive_same_event() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let id = EventId::new();
        assert_eq!(bus.publish(make_event(id)), 2);

        let Ok(e1) = rx1.recv().await else {
            panic!("rx1 failed");
        };
        let Ok(e2) = rx2.recv().await else {
            panic!("rx2 failed");
        };
        assert_eq!(e1.event_id(), id);
        assert_eq!(e1, e2);
    }

    #[tokio::test]
    async fn dispatch_publishes_on_the_bus() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let id = EventId::new();

        assert!(bus.dispatch(make_event(id)).await.is_ok());

        let Ok(event) = rx.recv().await else {
            panic!("expected event");
        };
        assert_eq!(event.event_id(), id);
    }

    #[test]
    fn receiver_count_tracks_subscribers() {
        let bus = EventBus::new(16);
        assert_eq!(bus.receiver_count(), 0);
        let rx = bus.subscribe();
        assert_eq!(bus.receiver_count(), 1);
        drop(rx);
        assert_eq!(bus.receiver_count(), 0);
    }
}
