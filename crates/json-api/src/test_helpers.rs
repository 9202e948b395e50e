//! Test helpers.

use std::sync::Arc;

use atelier_app::domain::{
    carts::{MockCartsService, records::CartOwner},
    catalog::MockCatalogService,
    checkout::MockCheckoutService,
    ledger::MockLedgerService,
    orders::MockOrdersService,
    payments::MockWebhooksService,
    users::{MockUsersService, records::UserUuid},
};
use salvo::{affix_state::inject, prelude::*};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::{extensions::*, session::Visitor, state::State};

pub(crate) const OPERATOR_TOKEN: &str = "op_test_0123456789";

pub(crate) const TEST_SESSION: &str = "0123456789abcdef0123456789abcdef";

pub(crate) const TEST_USER: UserUuid = UserUuid::from_uuid(Uuid::from_u128(0x0199_0000_0000_7000_8000_0000_0000_0001));

/// One mock per service. Mocks without expectations fail on any call.
#[derive(Default)]
pub(crate) struct Mocks {
    pub(crate) catalog: MockCatalogService,
    pub(crate) carts: MockCartsService,
    pub(crate) checkout: MockCheckoutService,
    pub(crate) orders: MockOrdersService,
    pub(crate) ledger: MockLedgerService,
    pub(crate) webhooks: MockWebhooksService,
    pub(crate) users: MockUsersService,
}

impl Mocks {
    pub(crate) fn into_state(self) -> Arc<State> {
        Arc::new(State {
            catalog: Arc::new(self.catalog),
            carts: Arc::new(self.carts),
            checkout: Arc::new(self.checkout),
            orders: Arc::new(self.orders),
            ledger: Arc::new(self.ledger),
            webhooks: Arc::new(self.webhooks),
            users: Arc::new(self.users),
            operator_token: Arc::new(Zeroizing::new(OPERATOR_TOKEN.to_string())),
        })
    }
}

pub(crate) fn session_visitor() -> Visitor {
    Visitor {
        owner: CartOwner::Session(TEST_SESSION.to_string()),
        session: Some(TEST_SESSION.to_string()),
        operator: false,
    }
}

pub(crate) fn user_visitor() -> Visitor {
    Visitor {
        owner: CartOwner::User(TEST_USER),
        session: None,
        operator: false,
    }
}

pub(crate) fn operator_visitor() -> Visitor {
    Visitor {
        operator: true,
        ..session_visitor()
    }
}

/// Stands in for the session middleware with a fixed visitor.
struct InjectVisitor(Visitor);

#[salvo::handler]
impl InjectVisitor {
    async fn handle(&self, req: &mut Request, depot: &mut Depot, res: &mut Response, ctrl: &mut FlowCtrl) {
        depot.insert_visitor(self.0.clone());
        ctrl.call_next(req, depot, res).await;
    }
}

pub(crate) fn service(mocks: Mocks, visitor: Visitor, route: Router) -> Service {
    Service::new(
        Router::new()
            .hoop(inject(mocks.into_state()))
            .hoop(InjectVisitor(visitor))
            .push(route),
    )
}

pub(crate) fn carts_service(carts: MockCartsService, visitor: Visitor, route: Router) -> Service {
    service(
        Mocks {
            carts,
            ..Mocks::default()
        },
        visitor,
        route,
    )
}

pub(crate) fn catalog_service(catalog: MockCatalogService, visitor: Visitor, route: Router) -> Service {
    service(
        Mocks {
            catalog,
            ..Mocks::default()
        },
        visitor,
        route,
    )
}

pub(crate) fn orders_service(orders: MockOrdersService, visitor: Visitor, route: Router) -> Service {
    service(
        Mocks {
            orders,
            ..Mocks::default()
        },
        visitor,
        route,
    )
}
