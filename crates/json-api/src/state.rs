//! State

use std::sync::Arc;

use atelier_app::{
    context::AppContext,
    domain::{
        carts::CartsService, catalog::CatalogService, checkout::CheckoutService,
        ledger::LedgerService, orders::OrdersService, payments::WebhooksService,
        users::UsersService,
    },
};
use zeroize::Zeroizing;

/// Services the handlers reach through the depot.
#[derive(Clone)]
pub(crate) struct State {
    pub(crate) catalog: Arc<dyn CatalogService>,
    pub(crate) carts: Arc<dyn CartsService>,
    pub(crate) checkout: Arc<dyn CheckoutService>,
    pub(crate) orders: Arc<dyn OrdersService>,
    pub(crate) ledger: Arc<dyn LedgerService>,
    pub(crate) webhooks: Arc<dyn WebhooksService>,
    pub(crate) users: Arc<dyn UsersService>,

    /// Empty when operator routes are disabled.
    pub(crate) operator_token: Arc<Zeroizing<String>>,
}

impl State {
    #[must_use]
    pub(crate) fn from_app_context(app: &AppContext, operator_token: Zeroizing<String>) -> Arc<Self> {
        Arc::new(Self {
            catalog: Arc::clone(&app.catalog),
            carts: Arc::clone(&app.carts),
            checkout: Arc::clone(&app.checkout),
            orders: Arc::clone(&app.orders),
            ledger: Arc::clone(&app.ledger),
            webhooks: Arc::clone(&app.webhooks),
            users: Arc::clone(&app.users),
            operator_token: Arc::new(operator_token),
        })
    }
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("operator_routes", &!self.operator_token.is_empty())
            .finish_non_exhaustive()
    }
}
