//! Card gateway capability.

use async_trait::async_trait;
use atelier::{
    errors::{Categorised, ErrorKind},
    orders::OrderCode,
};
use mockall::automock;
use serde::Deserialize;
use thiserror::Error;

/// Ask the gateway for a payment intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentRequest {
    pub order_code: OrderCode,
    /// Minor units.
    pub amount: u64,
    /// ISO 4217 code.
    pub currency: String,
    pub email: Option<String>,
}

impl IntentRequest {
    /// Retrying the same order never creates a second intent.
    #[must_use]
    pub fn idempotency_key(&self) -> String {
        format!("intent-{}", self.order_code)
    }
}

/// Intent handle returned to the buyer's browser.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

/// Return captured money.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundRequest {
    pub payment_intent_id: String,
    /// Minor units.
    pub amount: u64,
    pub idempotency_key: String,
}

impl RefundRequest {
    /// A full refund keyed by order code, so repeated deliveries refund once.
    #[must_use]
    pub fn for_order(code: &OrderCode, payment_intent_id: String, amount: u64) -> Self {
        Self {
            payment_intent_id,
            amount,
            idempotency_key: format!("refund-{code}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RefundReceipt {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Error)]
pub enum PaymentGatewayError {
    #[error("gateway request failed")]
    Transport(#[source] reqwest::Error),

    #[error("gateway answered {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("gateway response could not be read")]
    Decode(#[source] reqwest::Error),
}

impl Categorised for PaymentGatewayError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::GatewayUnreachable
    }
}

#[automock]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create an authorise-and-capture intent for an order.
    async fn create_intent(&self, request: IntentRequest) -> Result<PaymentIntent, PaymentGatewayError>;

    /// Refund a captured intent.
    async fn refund(&self, request: RefundRequest) -> Result<RefundReceipt, PaymentGatewayError>;
}
