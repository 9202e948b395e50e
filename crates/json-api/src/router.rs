//! App Router

use salvo::Router;

use crate::{
    carts, catalog, checkout, healthcheck, ledger, observability, orders,
    session::{middleware, operator::require_operator},
};

/// Every route, before request logging, state injection and docs are layered on.
///
/// The webhook authenticates by signature, so it sits outside the session middleware and never
/// receives a cart cookie.
pub(crate) fn app_router() -> Router {
    Router::new()
        .push(Router::with_path("healthcheck").get(healthcheck::handler))
        .push(Router::with_path("metrics").get(observability::metrics_handler))
        .push(Router::with_path("checkout/webhook").post(checkout::webhook::handler))
        .push(
            Router::new()
                .hoop(middleware::handler)
                .push(catalog_routes())
                .push(cart_routes())
                .push(Router::with_path("checkout/intent").post(checkout::intent::handler))
                .push(order_routes())
                .push(
                    Router::with_path("variants/{variant}/stock-adjustments")
                        .hoop(require_operator)
                        .post(ledger::adjust::handler),
                ),
        )
}

fn catalog_routes() -> Router {
    Router::new()
        .push(
            Router::with_path("products")
                .get(catalog::index::handler)
                .push(
                    Router::with_path("{product}")
                        .get(catalog::get::handler)
                        .push(Router::with_path("variant").get(catalog::variant::handler)),
                ),
        )
        .push(Router::with_path("variants/{variant}/stock").get(catalog::stock::handler))
}

fn cart_routes() -> Router {
    Router::with_path("cart")
        .get(carts::view::handler)
        .push(Router::with_path("add/{variant}").post(carts::add::handler))
        .push(Router::with_path("increment/{line}").post(carts::lines::increment))
        .push(Router::with_path("decrement/{line}").post(carts::lines::decrement))
        .push(Router::with_path("remove/{line}").post(carts::lines::remove))
        .push(Router::with_path("clear").post(carts::clear::handler))
        .push(Router::with_path("review").post(carts::review::handler))
        .push(Router::with_path("merge").post(carts::merge::handler))
        .push(Router::with_path("shipping-quotes").post(carts::quotes::handler))
}

fn order_routes() -> Router {
    Router::with_path("orders/{code}")
        .get(orders::get::handler)
        .push(Router::with_path("cancel").post(orders::transitions::cancel))
        .push(
            Router::new()
                .hoop(require_operator)
                .push(Router::with_path("ship").post(orders::transitions::ship))
                .push(Router::with_path("arrive").post(orders::transitions::arrive))
                .push(Router::with_path("deliver").post(orders::transitions::deliver))
                .push(Router::with_path("refund").post(orders::transitions::refund)),
        )
}

#[cfg(test)]
mod tests {
    use atelier_app::domain::{
        orders::MockOrdersService,
        users::{MockUsersService, UsersServiceError},
    };
    use salvo::{
        affix_state::inject,
        http::header::{AUTHORIZATION, COOKIE},
        prelude::*,
        test::TestClient,
    };
    use testresult::TestResult;

    use crate::test_helpers::{Mocks, TEST_SESSION};

    use super::*;

    fn make_service(mocks: Mocks) -> Service {
        Service::new(Router::new().hoop(inject(mocks.into_state())).push(app_router()))
    }

    #[tokio::test]
    async fn operator_routes_reject_buyers() -> TestResult {
        let mut orders = MockOrdersService::new();

        let mut users = MockUsersService::new();

        orders.expect_ship().never();
        orders.expect_refund().never();

        users
            .expect_authenticate_bearer()
            .once()
            .return_once(|_| Err(UsersServiceError::InvalidToken));

        let service = make_service(Mocks {
            orders,
            users,
            ..Mocks::default()
        });

        let ship = TestClient::post("http://example.com/orders/7K3M9Q2X/ship")
            .add_header(COOKIE, format!("cart_session={TEST_SESSION}"), true)
            .json(&serde_json::json!({}))
            .send(&service)
            .await;

        let refund = TestClient::post("http://example.com/orders/7K3M9Q2X/refund")
            .add_header(AUTHORIZATION, "Bearer not-the-operator", true)
            .send(&service)
            .await;

        assert_eq!(ship.status_code, Some(StatusCode::UNAUTHORIZED));
        assert_eq!(refund.status_code, Some(StatusCode::UNAUTHORIZED));

        Ok(())
    }

    #[tokio::test]
    async fn stock_adjustments_require_the_operator() -> TestResult {
        let res = TestClient::post(format!(
            "http://example.com/variants/{}/stock-adjustments",
            uuid::Uuid::now_v7()
        ))
        .json(&serde_json::json!({ "delta": 5 }))
        .send(&make_service(Mocks::default()))
        .await;

        assert_eq!(res.status_code, Some(StatusCode::UNAUTHORIZED));

        Ok(())
    }
}
