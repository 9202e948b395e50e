//! Add to Cart Handler

use std::sync::Arc;

use jiff::Timestamp;
use salvo::{
    oapi::extract::{JsonBody, PathParam},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    carts::{errors::into_status_error, handlers::redirect_to_cart},
    extensions::*,
    state::State,
};

const fn one() -> u32 {
    1
}

/// Add to Cart Request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct AddToCartRequest {
    /// Units to add, one when omitted
    #[serde(default = "one")]
    pub qty: u32,
}

/// Add to Cart Handler
#[endpoint(
    tags("carts"),
    summary = "Add Variant to Cart",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::FOUND, description = "Added; redirects to the cart"),
        (status_code = StatusCode::BAD_REQUEST, description = "Invalid quantity"),
        (status_code = StatusCode::NOT_FOUND, description = "Variant not found"),
        (status_code = StatusCode::CONFLICT, description = "Out of stock"),
        (status_code = StatusCode::TOO_MANY_REQUESTS, description = "Rate limited"),
        (status_code = StatusCode::INTERNAL_SERVER_ERROR, description = "Internal Server Error"),
    ),
)]
#[tracing::instrument(
    name = "carts.add",
    skip(variant, json, depot, res),
    fields(variant_uuid = tracing::field::Empty, quantity = tracing::field::Empty),
    err
)]
pub(crate) async fn handler(
    variant: PathParam<Uuid>,
    json: JsonBody<AddToCartRequest>,
    depot: &mut Depot,
    res: &mut Response,
) -> Result<StatusCode, StatusError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let visitor = depot.visitor_or_500()?;
    let variant = variant.into_inner();
    let quantity = json.into_inner().qty;

    let span = tracing::Span::current();

    span.record("variant_uuid", tracing::field::display(variant));
    span.record("quantity", quantity);

    state
        .carts
        .add(visitor.owner.clone(), variant.into(), quantity, Timestamp::now())
        .await
        .map_err(|error| into_status_error(error, res))?;

    redirect_to_cart(res)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use atelier_app::domain::carts::{CartsServiceError, MockCartsService};
    use salvo::{http::header::{LOCATION, RETRY_AFTER}, test::TestClient};
    use testresult::TestResult;

    use crate::{
        carts::handlers::tests::{make_line, make_view},
        test_helpers::{carts_service, session_visitor},
    };

    use super::*;

    fn make_service(carts: MockCartsService) -> Service {
        carts_service(
            carts,
            session_visitor(),
            Router::with_path("cart/add/{variant}").post(handler),
        )
    }

    fn header<'a>(res: &'a Response, name: salvo::http::header::HeaderName) -> Option<&'a str> {
        res.headers().get(name).and_then(|value| value.to_str().ok())
    }

    #[tokio::test]
    async fn add_redirects_to_cart() -> TestResult {
        let mut carts = MockCartsService::new();
        let variant = Uuid::now_v7();

        carts
            .expect_add()
            .once()
            .withf(move |owner, v, quantity, _| {
                *owner == session_visitor().owner && v.into_uuid() == variant && *quantity == 3
            })
            .return_once(move |_, _, _, _| Ok(make_view(vec![make_line(variant, 3, 5_990)])));

        let res = TestClient::post(format!("http://example.com/cart/add/{variant}"))
            .json(&serde_json::json!({ "qty": 3 }))
            .send(&make_service(carts))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::FOUND));
        assert_eq!(header(&res, LOCATION), Some("/cart"));

        Ok(())
    }

    #[tokio::test]
    async fn missing_quantity_adds_one() -> TestResult {
        let mut carts = MockCartsService::new();
        let variant = Uuid::now_v7();

        carts
            .expect_add()
            .once()
            .withf(|_, _, quantity, _| *quantity == 1)
            .return_once(move |_, _, _, _| Ok(make_view(vec![make_line(variant, 1, 5_990)])));

        let res = TestClient::post(format!("http://example.com/cart/add/{variant}"))
            .json(&serde_json::json!({}))
            .send(&make_service(carts))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::FOUND));

        Ok(())
    }

    #[tokio::test]
    async fn unknown_variant_returns_404() -> TestResult {
        let mut carts = MockCartsService::new();
        let variant = Uuid::now_v7();

        carts
            .expect_add()
            .once()
            .return_once(move |_, _, _, _| Err(CartsServiceError::UnknownVariant(variant.into())));

        let res = TestClient::post(format!("http://example.com/cart/add/{variant}"))
            .json(&serde_json::json!({ "qty": 1 }))
            .send(&make_service(carts))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::NOT_FOUND));

        Ok(())
    }

    #[tokio::test]
    async fn out_of_stock_returns_409() -> TestResult {
        let mut carts = MockCartsService::new();
        let variant = Uuid::now_v7();

        carts.expect_add().once().return_once(move |_, _, _, _| {
            Err(CartsServiceError::OutOfStock {
                variant: variant.into(),
                available: 1,
            })
        });

        let res = TestClient::post(format!("http://example.com/cart/add/{variant}"))
            .json(&serde_json::json!({ "qty": 2 }))
            .send(&make_service(carts))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::CONFLICT));

        Ok(())
    }

    #[tokio::test]
    async fn rate_limited_returns_429_with_retry_after() -> TestResult {
        let mut carts = MockCartsService::new();
        let variant = Uuid::now_v7();

        carts.expect_add().once().return_once(|_, _, _, _| {
            Err(CartsServiceError::RateLimited {
                retry_after: Duration::from_secs(42),
            })
        });

        let res = TestClient::post(format!("http://example.com/cart/add/{variant}"))
            .json(&serde_json::json!({ "qty": 1 }))
            .send(&make_service(carts))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::TOO_MANY_REQUESTS));
        assert_eq!(header(&res, RETRY_AFTER), Some("42"));

        Ok(())
    }

    #[tokio::test]
    async fn malformed_variant_returns_400() -> TestResult {
        let mut carts = MockCartsService::new();

        carts.expect_add().never();

        let res = TestClient::post("http://example.com/cart/add/not-a-uuid")
            .json(&serde_json::json!({ "qty": 1 }))
            .send(&make_service(carts))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::BAD_REQUEST));

        Ok(())
    }
}
