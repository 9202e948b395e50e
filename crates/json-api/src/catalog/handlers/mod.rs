//! Catalog Handlers

pub(crate) mod get;
pub(crate) mod index;
pub(crate) mod stock;
pub(crate) mod variant;
