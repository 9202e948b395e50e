//! Create Payment Intent Handler

use std::sync::Arc;

use atelier::{errors::Categorised, pricing::OrderTotals, shipping::PostalCode};
use atelier_app::domain::{
    checkout::data::{CheckoutIntent, CheckoutRequest},
    orders::records::ShippingAddress,
};
use jiff::Timestamp;
use salvo::{oapi::extract::JsonBody, prelude::*};
use serde::{Deserialize, Serialize};

use crate::{errors::into_status_error, extensions::*, observability::metrics, state::State};

/// Address Request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub(crate) struct AddressRequest {
    pub recipient: String,
    pub street: String,
    pub number: String,
    #[serde(default)]
    pub complement: Option<String>,
    pub district: String,
    pub city: String,

    /// Two-letter state code
    pub state: String,

    /// CEP, with or without the hyphen
    pub postal_code: String,
}

impl AddressRequest {
    fn into_address(self) -> Result<ShippingAddress, StatusError> {
        let postal_code: PostalCode = self.postal_code.parse().map_err(into_status_error)?;

        Ok(ShippingAddress {
            recipient: self.recipient,
            street: self.street,
            number: self.number,
            complement: self.complement.filter(|complement| !complement.trim().is_empty()),
            district: self.district,
            city: self.city,
            state: self.state.trim().to_uppercase(),
            postal_code,
        })
    }
}

/// Checkout Intent Request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct CheckoutIntentRequest {
    /// Fingerprint from the last cart review
    pub fingerprint: String,

    /// Receipt address; signed-in buyers default to their account email
    #[serde(default)]
    pub email: Option<String>,

    pub address: AddressRequest,

    /// Option id from the shipping quote
    pub shipping_option: String,

    #[serde(default)]
    pub coupon: Option<String>,
}

/// Totals Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct TotalsResponse {
    pub items: u64,
    pub shipping: u64,
    pub discount: u64,
    pub grand: u64,
}

impl From<OrderTotals> for TotalsResponse {
    fn from(totals: OrderTotals) -> Self {
        Self {
            items: totals.items,
            shipping: totals.shipping,
            discount: totals.discount,
            grand: totals.grand,
        }
    }
}

/// Checkout Intent Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct CheckoutIntentResponse {
    pub order_code: String,
    pub intent_id: String,

    /// Hand this to the gateway's browser SDK to confirm payment
    pub client_secret: String,

    pub totals: TotalsResponse,
}

impl From<CheckoutIntent> for CheckoutIntentResponse {
    fn from(intent: CheckoutIntent) -> Self {
        Self {
            order_code: intent.order_code.to_string(),
            intent_id: intent.intent_id,
            client_secret: intent.client_secret,
            totals: intent.totals.into(),
        }
    }
}

/// Create Payment Intent Handler
///
/// Turns the reviewed cart into a pending order holding stock and returns the gateway intent.
#[endpoint(
    tags("checkout"),
    summary = "Create Payment Intent",
    security(("bearer_auth" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Intent created"),
        (status_code = StatusCode::BAD_REQUEST, description = "Invalid address, shipping option or coupon"),
        (status_code = StatusCode::FORBIDDEN, description = "Cart fingerprint mismatch"),
        (status_code = StatusCode::CONFLICT, description = "Out of stock"),
        (status_code = StatusCode::SERVICE_UNAVAILABLE, description = "Payment gateway unreachable"),
    ),
)]
#[tracing::instrument(
    name = "checkout.intent",
    skip(json, depot),
    fields(order_code = tracing::field::Empty),
    err
)]
pub(crate) async fn handler(
    json: JsonBody<CheckoutIntentRequest>,
    depot: &mut Depot,
) -> Result<Json<CheckoutIntentResponse>, StatusError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let visitor = depot.visitor_or_500()?;
    let request = json.into_inner();

    let checkout = CheckoutRequest {
        owner: visitor.owner.clone(),
        fingerprint: request.fingerprint,
        email: request.email.filter(|email| !email.trim().is_empty()),
        address: request.address.into_address()?,
        shipping_option: request.shipping_option,
        coupon: request.coupon.filter(|coupon| !coupon.trim().is_empty()),
    };

    let intent = match state.checkout.create_intent(checkout, Timestamp::now()).await {
        Ok(intent) => intent,
        Err(checkout_error) => {
            metrics::observe_checkout(checkout_error.kind().as_str());

            return Err(into_status_error(checkout_error));
        }
    };

    metrics::observe_checkout("created");

    tracing::Span::current().record("order_code", tracing::field::display(&intent.order_code));

    Ok(Json(intent.into()))
}

#[cfg(test)]
mod tests {
    use atelier::{
        carts::fingerprint::FingerprintError, orders::OrderCode, reservations::Shortage,
    };
    use atelier_app::domain::{
        carts::CartsServiceError,
        checkout::{CheckoutServiceError, MockCheckoutService},
        payments::gateway::PaymentGatewayError,
        reservations::ReservationsServiceError,
    };
    use salvo::test::{ResponseExt, TestClient};
    use serde_json::{Value, json};
    use testresult::TestResult;
    use uuid::Uuid;

    use crate::test_helpers::{Mocks, TEST_USER, service, user_visitor};

    use super::*;

    fn make_service(checkout: MockCheckoutService) -> Service {
        service(
            Mocks {
                checkout,
                ..Mocks::default()
            },
            user_visitor(),
            Router::with_path("checkout/intent").post(handler),
        )
    }

    fn body() -> Value {
        json!({
            "fingerprint": "fp_test",
            "address": {
                "recipient": "Ana Souza",
                "street": "Rua Augusta",
                "number": "1500",
                "district": "Consolação",
                "city": "São Paulo",
                "state": "sp",
                "postal_code": "01304-001"
            },
            "shipping_option": "1",
            "coupon": "BEMVINDO10"
        })
    }

    #[tokio::test]
    async fn returns_intent_and_totals() -> TestResult {
        let mut checkout = MockCheckoutService::new();
        let code: OrderCode = "7K3M9Q2X".parse()?;

        checkout
            .expect_create_intent()
            .once()
            .withf(|request, _| {
                request.owner.user() == Some(TEST_USER)
                    && request.fingerprint == "fp_test"
                    && request.address.state == "SP"
                    && request.address.postal_code.digits() == "01304001"
                    && request.coupon.as_deref() == Some("BEMVINDO10")
                    && request.email.is_none()
            })
            .return_once(move |_, _| {
                Ok(CheckoutIntent {
                    order_code: code,
                    intent_id: "pi_123".to_string(),
                    client_secret: "pi_123_secret_abc".to_string(),
                    totals: OrderTotals::new(11_980, 2_150, 1_198),
                })
            });

        checkout.expect_shipping_options().never();

        let mut res = TestClient::post("http://example.com/checkout/intent")
            .json(&body())
            .send(&make_service(checkout))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::OK));

        let response: CheckoutIntentResponse = res.take_json().await?;

        assert_eq!(response.intent_id, "pi_123");
        assert_eq!(response.client_secret, "pi_123_secret_abc");
        assert_eq!(response.totals.grand, 12_932);

        Ok(())
    }

    #[tokio::test]
    async fn tampered_cart_returns_403() -> TestResult {
        let mut checkout = MockCheckoutService::new();

        checkout.expect_create_intent().once().return_once(|_, _| {
            Err(CheckoutServiceError::Cart(CartsServiceError::Fingerprint(
                FingerprintError::Tampered,
            )))
        });

        let res = TestClient::post("http://example.com/checkout/intent")
            .json(&body())
            .send(&make_service(checkout))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::FORBIDDEN));

        Ok(())
    }

    #[tokio::test]
    async fn shortage_returns_409() -> TestResult {
        let mut checkout = MockCheckoutService::new();
        let variant = Uuid::now_v7();

        checkout.expect_create_intent().once().return_once(move |_, _| {
            Err(CheckoutServiceError::Reservation(ReservationsServiceError::OutOfStock(
                Shortage {
                    variant,
                    requested: 3,
                    available: 1,
                },
            )))
        });

        let res = TestClient::post("http://example.com/checkout/intent")
            .json(&body())
            .send(&make_service(checkout))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::CONFLICT));

        Ok(())
    }

    #[tokio::test]
    async fn unreachable_gateway_returns_503() -> TestResult {
        let mut checkout = MockCheckoutService::new();

        checkout
            .expect_create_intent()
            .once()
            .return_once(|_, _| Err(CheckoutServiceError::Gateway(PaymentGatewayError::Rejected {
                status: 502,
                message: "bad gateway".to_string(),
            })));

        let res = TestClient::post("http://example.com/checkout/intent")
            .json(&body())
            .send(&make_service(checkout))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::SERVICE_UNAVAILABLE));

        Ok(())
    }

    #[tokio::test]
    async fn malformed_postal_code_returns_400_without_calling_checkout() -> TestResult {
        let mut checkout = MockCheckoutService::new();

        checkout.expect_create_intent().never();

        let mut request = body();

        request["address"]["postal_code"] = json!("abc");

        let res = TestClient::post("http://example.com/checkout/intent")
            .json(&request)
            .send(&make_service(checkout))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::BAD_REQUEST));

        Ok(())
    }
}
