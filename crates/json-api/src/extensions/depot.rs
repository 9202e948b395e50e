//! Depot helper extensions.

use std::any::Any;

use salvo::prelude::{Depot, StatusError};

use crate::session::Visitor;

const VISITOR_DEPOT_KEY: &str = "visitor";

/// Helpers for mapping depot extraction failures to HTTP errors.
pub(crate) trait DepotExt {
    fn obtain_or_500<T: Any + Send + Sync>(&self) -> Result<&T, StatusError>;

    fn insert_visitor(&mut self, visitor: Visitor);

    /// The visitor resolved by the session middleware.
    fn visitor_or_500(&self) -> Result<&Visitor, StatusError>;
}

impl DepotExt for Depot {
    fn obtain_or_500<T: Any + Send + Sync>(&self) -> Result<&T, StatusError> {
        self.obtain::<T>()
            .map_err(|_ignored| StatusError::internal_server_error())
    }

    fn insert_visitor(&mut self, visitor: Visitor) {
        self.insert(VISITOR_DEPOT_KEY, visitor);
    }

    fn visitor_or_500(&self) -> Result<&Visitor, StatusError> {
        self.get::<Visitor>(VISITOR_DEPOT_KEY)
            .map_err(|_ignored| StatusError::internal_server_error())
    }
}
