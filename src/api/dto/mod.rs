//! Data Transfer Objects for REST request/response serialization.
//!
//! Timestamps are RFC 3339 strings and identifiers are UUID strings.

pub mod event_dto;
pub mod registration_dto;

pub use event_dto::*;
pub use registration_dto::*;
