//! Gateway Webhook Handler

use std::sync::Arc;

use atelier::errors::Categorised;
use jiff::Timestamp;
use salvo::{oapi::ToSchema, prelude::*};
use serde::{Deserialize, Serialize};

use crate::{errors::into_status_error, extensions::*, observability::metrics, state::State};

/// Header carrying the gateway's `t=...,v1=...` signature.
pub(crate) const SIGNATURE_HEADER: &str = "stripe-signature";

/// Webhook Response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct WebhookResponse {
    /// `applied`, `duplicate`, `ignored` or `compensated`
    pub outcome: String,
}

/// Gateway Webhook Handler
///
/// Verifies the signature over the raw body before anything is parsed. Duplicates are
/// acknowledged with 200; every failure other than verification answers 500 so the gateway
/// retries.
#[endpoint(
    tags("checkout"),
    summary = "Payment Gateway Webhook",
    responses(
        (status_code = StatusCode::OK, description = "Event accepted"),
        (status_code = StatusCode::BAD_REQUEST, description = "Signature missing, stale or invalid"),
        (status_code = StatusCode::INTERNAL_SERVER_ERROR, description = "Transient failure; retry"),
    ),
)]
pub(crate) async fn handler(
    req: &mut Request,
    depot: &mut Depot,
) -> Result<Json<WebhookResponse>, StatusError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;

    let Some(signature) = req
        .header::<String>(SIGNATURE_HEADER)
        .filter(|signature| !signature.trim().is_empty())
    else {
        metrics::observe_webhook("unverified");

        return Err(StatusError::bad_request().brief("WEBHOOK_UNVERIFIED: missing signature header"));
    };

    let payload = req
        .payload()
        .await
        .or_400("WEBHOOK_UNVERIFIED: unreadable body")?
        .to_vec();

    match state.webhooks.handle(payload, signature, Timestamp::now()).await {
        Ok(outcome) => {
            metrics::observe_webhook(outcome.as_str());

            tracing::info!(outcome = outcome.as_str(), "gateway event handled");

            Ok(Json(WebhookResponse {
                outcome: outcome.as_str().to_string(),
            }))
        }
        Err(webhook_error) => {
            metrics::observe_webhook(webhook_error.kind().as_str());

            Err(into_status_error(webhook_error))
        }
    }
}

#[cfg(test)]
mod tests {
    use atelier::webhooks::VerificationError;
    use atelier_app::domain::payments::{
        MockWebhooksService, WebhooksServiceError, records::WebhookOutcome,
    };
    use salvo::test::{ResponseExt, TestClient};
    use testresult::TestResult;

    use crate::test_helpers::{Mocks, service, session_visitor};

    use super::*;

    const PAYLOAD: &str = r#"{"id":"evt_1","type":"payment_intent.succeeded","data":{"object":{"id":"pi_1"}}}"#;

    fn make_service(webhooks: MockWebhooksService) -> Service {
        service(
            Mocks {
                webhooks,
                ..Mocks::default()
            },
            session_visitor(),
            Router::with_path("checkout/webhook").post(handler),
        )
    }

    #[tokio::test]
    async fn applied_event_returns_200() -> TestResult {
        let mut webhooks = MockWebhooksService::new();

        webhooks
            .expect_handle()
            .once()
            .withf(|payload, signature, _| payload == PAYLOAD.as_bytes() && signature == "t=1,v1=abc")
            .return_once(|_, _, _| Ok(WebhookOutcome::Applied));

        let mut res = TestClient::post("http://example.com/checkout/webhook")
            .add_header(SIGNATURE_HEADER, "t=1,v1=abc", true)
            .raw_json(PAYLOAD)
            .send(&make_service(webhooks))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::OK));

        let body: WebhookResponse = res.take_json().await?;

        assert_eq!(body.outcome, "applied");

        Ok(())
    }

    #[tokio::test]
    async fn duplicate_event_is_acknowledged() -> TestResult {
        let mut webhooks = MockWebhooksService::new();

        webhooks
            .expect_handle()
            .once()
            .return_once(|_, _, _| Ok(WebhookOutcome::Duplicate));

        let mut res = TestClient::post("http://example.com/checkout/webhook")
            .add_header(SIGNATURE_HEADER, "t=1,v1=abc", true)
            .raw_json(PAYLOAD)
            .send(&make_service(webhooks))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::OK));

        let body: WebhookResponse = res.take_json().await?;

        assert_eq!(body.outcome, "duplicate");

        Ok(())
    }

    #[tokio::test]
    async fn bad_signature_returns_400() -> TestResult {
        let mut webhooks = MockWebhooksService::new();

        webhooks
            .expect_handle()
            .once()
            .return_once(|_, _, _| Err(WebhooksServiceError::Unverified(VerificationError::Mismatch)));

        let res = TestClient::post("http://example.com/checkout/webhook")
            .add_header(SIGNATURE_HEADER, "t=1,v1=forged", true)
            .raw_json(PAYLOAD)
            .send(&make_service(webhooks))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::BAD_REQUEST));

        Ok(())
    }

    #[tokio::test]
    async fn missing_signature_returns_400_without_dispatch() -> TestResult {
        let mut webhooks = MockWebhooksService::new();

        webhooks.expect_handle().never();

        let res = TestClient::post("http://example.com/checkout/webhook")
            .raw_json(PAYLOAD)
            .send(&make_service(webhooks))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::BAD_REQUEST));

        Ok(())
    }

    #[tokio::test]
    async fn unknown_intent_returns_500_for_retry() -> TestResult {
        let mut webhooks = MockWebhooksService::new();

        webhooks
            .expect_handle()
            .once()
            .return_once(|_, _, _| Err(WebhooksServiceError::UnknownIntent("pi_1".to_string())));

        let res = TestClient::post("http://example.com/checkout/webhook")
            .add_header(SIGNATURE_HEADER, "t=1,v1=abc", true)
            .raw_json(PAYLOAD)
            .send(&make_service(webhooks))
            .await;

        assert_eq!(res.status_code, Some(StatusCode::INTERNAL_SERVER_ERROR));

        Ok(())
    }
}
