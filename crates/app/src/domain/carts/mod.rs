//! Carts
//!
//! Session and buyer carts, their fingerprints and the per-buyer mutation limit.

pub mod errors;
pub mod rate_limit;
pub mod records;
pub(crate) mod repository;
pub mod service;
pub mod stores;

pub use errors::CartsServiceError;
pub use service::*;
