//! Checkout
//!
//! Turns a reviewed cart into a pending order holding stock, and hands the buyer a payment
//! intent.

pub mod data;
pub mod errors;
pub mod service;

pub use errors::CheckoutServiceError;
pub use service::*;
