//! Domain layer: identifiers, events, registrations and their state
//! machine, and the post-commit notification plumbing.

pub mod dispatcher;
pub mod event;
pub mod event_bus;
pub mod ids;
pub mod registration;
pub mod registration_event;

pub use dispatcher::{DispatchError, NotificationDispatcher};
pub use event::{Event, EventStatus, EventSummary};
pub use event_bus::EventBus;
pub use ids::{EventId, RegistrationId, UserId};
pub use registration::{Placement, Registration, RegistrationStatus, TransitionError, Vacated};
pub use registration_event::RegistrationEvent;
