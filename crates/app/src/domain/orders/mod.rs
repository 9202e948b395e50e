//! Orders

pub mod data;
pub mod errors;
pub(crate) mod machine;
pub mod records;
pub(crate) mod repository;
pub mod service;

pub use errors::OrdersServiceError;
pub use service::*;
