//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::EventBus;
use crate::service::RegistrationApi;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Registration service, type-erased over its store.
    pub registrations: Arc<dyn RegistrationApi>,
    /// Bus carrying post-commit registration events.
    pub event_bus: EventBus,
}
