//! Reservations

pub mod errors;
pub(crate) mod holds;
pub mod records;
pub(crate) mod repository;
pub mod service;

pub use errors::ReservationsServiceError;
pub use service::*;
