//! # rsvp-gateway
//!
//! Event registration service with fixed capacity, an ordered waitlist
//! and automatic promotion.
//!
//! Registering confirms a user while slots remain and appends them to
//! the waitlist otherwise. Cancelling a confirmed registration promotes
//! waitlist position 1 in the same transaction. All correctness rests on
//! row locks in the datastore, so any number of instances can serve the
//! same database.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── RegistrationService (service/)
//!     │     ├── registration engine: register, cancel_and_promote
//!     │     └── post-commit: status refresh, NotificationDispatcher
//!     │
//!     ├── EventBus (domain/)
//!     │
//!     └── RegistrationStore (persistence/)
//!           ├── PgStore (PostgreSQL, FOR UPDATE / SKIP LOCKED)
//!           └── MemoryStore (in-process)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
