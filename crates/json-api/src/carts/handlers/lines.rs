//! Cart Line Handlers
//!
//! The line key is the variant the line holds.

use std::sync::Arc;

use jiff::Timestamp;
use salvo::{oapi::extract::PathParam, prelude::*};
use uuid::Uuid;

use crate::{
    carts::{errors::into_status_error, handlers::redirect_to_cart},
    extensions::*,
    state::State,
};

/// Increment Line Handler
#[endpoint(
    tags("carts"),
    summary = "Increment Cart Line",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::FOUND, description = "Redirects to the cart"),
        (status_code = StatusCode::BAD_REQUEST, description = "Line would exceed the quantity limit"),
        (status_code = StatusCode::NOT_FOUND, description = "Line not found"),
        (status_code = StatusCode::CONFLICT, description = "Out of stock"),
        (status_code = StatusCode::TOO_MANY_REQUESTS, description = "Rate limited"),
    ),
)]
pub(crate) async fn increment(
    line: PathParam<Uuid>,
    depot: &mut Depot,
    res: &mut Response,
) -> Result<StatusCode, StatusError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let visitor = depot.visitor_or_500()?;

    state
        .carts
        .increment(visitor.owner.clone(), line.into_inner().into(), Timestamp::now())
        .await
        .map_err(|error| into_status_error(error, res))?;

    redirect_to_cart(res)
}

/// Decrement Line Handler
///
/// Decrementing the last unit removes the line.
#[endpoint(
    tags("carts"),
    summary = "Decrement Cart Line",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::FOUND, description = "Redirects to the cart"),
        (status_code = StatusCode::NOT_FOUND, description = "Line not found"),
        (status_code = StatusCode::TOO_MANY_REQUESTS, description = "Rate limited"),
    ),
)]
pub(crate) async fn decrement(
    line: PathParam<Uuid>,
    depot: &mut Depot,
    res: &mut Response,
) -> Result<StatusCode, StatusError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let visitor = depot.visitor_or_500()?;

    state
        .carts
        .decrement(visitor.owner.clone(), line.into_inner().into(), Timestamp::now())
        .await
        .map_err(|error| into_status_error(error, res))?;

    redirect_to_cart(res)
}

/// Remove Line Handler
#[endpoint(
    tags("carts"),
    summary = "Remove Cart Line",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::FOUND, description = "Redirects to the cart"),
        (status_code = StatusCode::NOT_FOUND, description = "Line not found"),
        (status_code = StatusCode::TOO_MANY_REQUESTS, description = "Rate limited"),
    ),
)]
pub(crate) async fn remove(
    line: PathParam<Uuid>,
    depot: &mut Depot,
    res: &mut Response,
) -> Result<StatusCode, StatusError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let visitor = depot.visitor_or_500()?;

    state
        .carts
        .remove(visitor.owner.clone(), line.into_inner().into(), Timestamp::now())
        .await
        .map_err(|error| into_status_error(error, res))?;

    redirect_to_cart(res)
}

#[cfg(test)]
mod tests {
    use atelier::carts::CartError;
    use atelier_app::domain::carts::{CartsServiceError, MockCartsService};
    use salvo::test::TestClient;
    use testresult::TestResult;

    use crate::{
        carts::handlers::tests::{make_line, make_view},
        test_helpers::{carts_service, user_visitor},
    };

    use super::*;

    fn make_service(carts: MockCartsService) -> Service {
        carts_service(
            carts,
            user_visitor(),
            Router::with_path("cart")
                .push(Router::with_path("increment/{line}").post(increment))
                .push(Router::with_path("decrement/{line}").post(decrement))
                .push(Router::with_path("remove/{line}").post(remove)),
        )
    }

    #[tokio::test]
    async fn increment_redirects_to_cart() -> TestResult {
        let mut carts = MockCartsService::new();
        let variant = Uuid::now_v7();

        carts
            .expect_increment()
            .once()
            .withf(move |owner, v, _| *owner == user_visitor().owner && v.into_uuid() == variant)
            .return_once(move |_, _, _| Ok(make_view(vec![make_line(variant, 2, 5_990)])));

        carts.expect_decrement().never();
        carts.expect_remove().never();

        let res = TestClient::post(format!("http://example.com/cart/increment/{variant}"))
            .send(&make_service(carts))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::FOUND));

        Ok(())
    }

    #[tokio::test]
    async fn increment_past_the_limit_returns_400() -> TestResult {
        let mut carts = MockCartsService::new();
        let variant = Uuid::now_v7();

        carts
            .expect_increment()
            .once()
            .return_once(|_, _, _| Err(CartsServiceError::Contents(CartError::QuantityOutOfRange(100))));

        let res = TestClient::post(format!("http://example.com/cart/increment/{variant}"))
            .send(&make_service(carts))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::BAD_REQUEST));

        Ok(())
    }

    #[tokio::test]
    async fn decrement_redirects_to_cart() -> TestResult {
        let mut carts = MockCartsService::new();
        let variant = Uuid::now_v7();

        carts
            .expect_decrement()
            .once()
            .withf(move |_, v, _| v.into_uuid() == variant)
            .return_once(|_, _, _| Ok(make_view(Vec::new())));

        carts.expect_increment().never();
        carts.expect_remove().never();

        let res = TestClient::post(format!("http://example.com/cart/decrement/{variant}"))
            .send(&make_service(carts))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::FOUND));

        Ok(())
    }

    #[tokio::test]
    async fn remove_missing_line_returns_404() -> TestResult {
        let mut carts = MockCartsService::new();
        let variant = Uuid::now_v7();

        carts
            .expect_remove()
            .once()
            .return_once(move |_, _, _| Err(CartsServiceError::Contents(CartError::UnknownLine(variant))));

        let res = TestClient::post(format!("http://example.com/cart/remove/{variant}"))
            .send(&make_service(carts))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::NOT_FOUND));

        Ok(())
    }
}
