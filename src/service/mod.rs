//! Service layer: the registration engine and its transaction-owning
//! facade.
//!
//! [`registration_engine`] holds the two locked protocols, written once
//! against the persistence accessor traits. [`RegistrationService`]
//! opens and commits the transactions around them, refreshes the cached
//! event status, and hands committed changes to the
//! [`crate::domain::NotificationDispatcher`].

pub mod registration_engine;
pub mod registration_service;

pub use registration_engine::CancelOutcome;
pub use registration_service::{NewEvent, RegistrationApi, RegistrationService};
