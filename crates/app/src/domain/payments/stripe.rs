//! Stripe-compatible gateway client.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, de::DeserializeOwned};
use zeroize::Zeroizing;

use crate::{
    domain::payments::gateway::{
        IntentRequest, PaymentGateway, PaymentGatewayError, PaymentIntent, RefundReceipt,
        RefundRequest,
    },
    settings::GatewaySettings,
};

/// HTTP client for the gateway's payment intent and refund endpoints.
#[derive(Debug, Clone)]
pub struct StripeGateway {
    api_base: String,
    api_key: Zeroizing<String>,
    http: Client,
}

impl StripeGateway {
    /// Build a client with the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentGatewayError::Transport`] if the HTTP client cannot be built.
    pub fn new(settings: &GatewaySettings) -> Result<Self, PaymentGatewayError> {
        let http = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(PaymentGatewayError::Transport)?;

        Ok(Self {
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            http,
        })
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        idempotency_key: &str,
        form: &[(&str, String)],
    ) -> Result<T, PaymentGatewayError> {
        let response = self
            .http
            .post(format!("{}{path}", self.api_base))
            .bearer_auth(self.api_key.as_str())
            .header("Idempotency-Key", idempotency_key)
            .form(form)
            .send()
            .await
            .map_err(PaymentGatewayError::Transport)?;

        decode(response).await
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[tracing::instrument(skip(self, request), fields(order = %request.order_code))]
    async fn create_intent(&self, request: IntentRequest) -> Result<PaymentIntent, PaymentGatewayError> {
        let intent: PaymentIntent = self
            .post_form(
                "/v1/payment_intents",
                &request.idempotency_key(),
                &intent_form(&request),
            )
            .await?;

        tracing::info!(intent = %intent.id, "payment intent created");

        Ok(intent)
    }

    #[tracing::instrument(skip(self, request), fields(intent = %request.payment_intent_id))]
    async fn refund(&self, request: RefundRequest) -> Result<RefundReceipt, PaymentGatewayError> {
        let receipt: RefundReceipt = self
            .post_form("/v1/refunds", &request.idempotency_key, &refund_form(&request))
            .await?;

        tracing::info!(refund = %receipt.id, status = %receipt.status, "refund issued");

        Ok(receipt)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, PaymentGatewayError> {
    let status = response.status();

    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&text)
            .map(|envelope| envelope.error.message)
            .unwrap_or(text);

        return Err(PaymentGatewayError::Rejected {
            status: status.as_u16(),
            message,
        });
    }

    response.json().await.map_err(PaymentGatewayError::Decode)
}

fn intent_form(request: &IntentRequest) -> Vec<(&'static str, String)> {
    let mut form = vec![
        ("amount", request.amount.to_string()),
        ("currency", request.currency.to_lowercase()),
        ("metadata[order_code]", request.order_code.to_string()),
        ("automatic_payment_methods[enabled]", "true".to_string()),
    ];

    if let Some(email) = &request.email {
        form.push(("receipt_email", email.clone()));
    }

    form
}

fn refund_form(request: &RefundRequest) -> Vec<(&'static str, String)> {
    vec![
        ("payment_intent", request.payment_intent_id.clone()),
        ("amount", request.amount.to_string()),
    ]
}
