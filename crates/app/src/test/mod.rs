//! Shared test infrastructure for service-level tests.

pub(crate) mod db;
pub(crate) mod helpers;

pub(crate) use context::TestContext;
