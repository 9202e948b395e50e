//! Persistence, integrations and services for the Atelier checkout pipeline.

pub mod cache;
pub mod context;
pub mod database;
pub mod domain;
pub mod settings;

#[cfg(test)]
mod test;

mod uuids;

pub use uuids::TypedUuid;
