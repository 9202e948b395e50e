//! Outbox
//!
//! Side effects recorded inside the transaction that caused them and delivered afterwards by a
//! worker, so an outage of a downstream system never rolls back a committed change.

pub mod errors;
pub mod handlers;
pub mod mailer;
pub mod messages;
pub mod records;
pub(crate) mod repository;
pub mod worker;

pub use errors::{OutboxHandlerError, OutboxServiceError};
pub use worker::*;
