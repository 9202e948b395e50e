//! Ledger Handlers

pub(crate) mod adjust;
