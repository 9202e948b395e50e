//! Payments
//!
//! Outbound intent creation and refunds through the card gateway, and inbound webhook dispatch.

pub mod errors;
pub mod gateway;
pub mod records;
pub(crate) mod repository;
pub mod service;
pub mod stripe;

pub use errors::WebhooksServiceError;
pub use service::*;
