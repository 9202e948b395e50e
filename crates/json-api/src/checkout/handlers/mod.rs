//! Checkout Handlers

pub(crate) mod intent;
pub(crate) mod webhook;
