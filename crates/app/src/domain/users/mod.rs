//! Users

pub mod errors;
pub mod records;
pub(crate) mod repository;
pub mod service;
pub mod token;

pub use errors::UsersServiceError;
pub use service::*;
