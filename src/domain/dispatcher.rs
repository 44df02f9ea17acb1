//! Notification dispatch contract.
//!
//! The registration service hands every committed [`RegistrationEvent`]
//! to a [`NotificationDispatcher`] on a detached task. Dispatch is
//! best-effort: a failure is logged and never rolls back or delays the
//! registration change that produced the event.

use std::fmt;

use futures_util::future::BoxFuture;

use super::RegistrationEvent;

/// Failure reported by a dispatcher.
#[derive(Debug, thiserror::Error)]
#[error("notification dispatch failed: {0}")]
pub struct DispatchError(pub String);

/// Delivers post-commit registration events to users or downstream
/// systems.
pub trait NotificationDispatcher: Send + Sync + fmt::Debug {
    /// Delivers a single event.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] when delivery fails; callers log it and
    /// move on.
    fn dispatch(&self, event: RegistrationEvent) -> BoxFuture<'_, Result<(), DispatchError>>;
}
