//! Payment webhooks
//!
//! Signature verification for gateway callbacks and the subset of the event payload the pipeline
//! reads. Signatures use the `t=<unix>,v1=<hex>` header scheme: an HMAC-SHA256 over
//! `"<timestamp>.<payload>"` keyed with the endpoint secret.

use std::{collections::BTreeMap, fmt};

use hmac::{Hmac, Mac};
use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use smallvec::SmallVec;
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::errors::{Categorised, ErrorKind};

type HmacSha256 = Hmac<Sha256>;

/// Largest accepted distance between the signed timestamp and now.
pub const DEFAULT_TOLERANCE: SignedDuration = SignedDuration::from_secs(300);

/// Metadata key carrying the order code on payment intents.
pub const ORDER_CODE_METADATA: &str = "order_code";

/// Reasons a webhook is refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerificationError {
    /// The endpoint secret is empty.
    #[error("webhook secret must not be empty")]
    EmptySecret,

    /// The header could not be parsed.
    #[error("malformed signature header")]
    Malformed,

    /// The header has no `t=` element.
    #[error("signature header has no timestamp")]
    MissingTimestamp,

    /// The header has no `v1=` element.
    #[error("signature header has no v1 signature")]
    MissingSignature,

    /// The timestamp is older than the tolerance.
    #[error("webhook timestamp is {age_seconds}s old")]
    Stale {
        /// Age of the signed timestamp.
        age_seconds: i64,
    },

    /// The timestamp is further in the future than the tolerance.
    #[error("webhook timestamp is in the future")]
    FromFuture,

    /// No signature matched.
    #[error("webhook signature mismatch")]
    Mismatch,
}

impl Categorised for VerificationError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptySecret => ErrorKind::Internal,
            _ => ErrorKind::WebhookUnverified,
        }
    }
}

/// Parsed `t=..,v1=..` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    /// Signed unix timestamp.
    pub timestamp: i64,

    /// Every `v1` signature present, decoded.
    pub signatures: SmallVec<[Vec<u8>; 2]>,
}

impl SignatureHeader {
    /// Parse a header value. Unknown schemes are ignored.
    ///
    /// # Errors
    ///
    /// Returns a [`VerificationError`] for malformed headers or missing elements.
    pub fn parse(header: &str) -> Result<Self, VerificationError> {
        let mut timestamp = None;
        let mut signatures = SmallVec::new();

        for element in header.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (key, value) = element
                .split_once('=')
                .ok_or(VerificationError::Malformed)?;

            match key {
                "t" => {
                    timestamp = Some(
                        value
                            .parse::<i64>()
                            .map_err(|_parse| VerificationError::Malformed)?,
                    );
                }
                "v1" => {
                    if let Ok(signature) = hex::decode(value) {
                        signatures.push(signature);
                    }
                }
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(VerificationError::MissingTimestamp)?;

        if signatures.is_empty() {
            return Err(VerificationError::MissingSignature);
        }

        Ok(Self {
            timestamp,
            signatures,
        })
    }
}

/// Verifies webhook signatures with the endpoint secret.
pub struct WebhookVerifier {
    secret: Zeroizing<Vec<u8>>,
    tolerance: SignedDuration,
}

impl fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("secret", &"<redacted>")
            .field("tolerance", &self.tolerance)
            .finish()
    }
}

impl WebhookVerifier {
    /// Create a verifier.
    ///
    /// # Errors
    ///
    /// Returns [`VerificationError::EmptySecret`] for an empty secret.
    pub fn new(secret: impl Into<Vec<u8>>, tolerance: SignedDuration) -> Result<Self, VerificationError> {
        let secret = Zeroizing::new(secret.into());

        if secret.is_empty() {
            return Err(VerificationError::EmptySecret);
        }

        Ok(Self { secret, tolerance })
    }

    /// Verify `payload` against the signature header at `now`.
    ///
    /// # Errors
    ///
    /// Returns a [`VerificationError`] when the header is malformed, stale or does not match.
    pub fn verify(&self, payload: &[u8], header: &str, now: Timestamp) -> Result<(), VerificationError> {
        let header = SignatureHeader::parse(header)?;
        let age_seconds = now.as_second().saturating_sub(header.timestamp);
        let tolerance = self.tolerance.as_secs();

        if age_seconds > tolerance {
            return Err(VerificationError::Stale { age_seconds });
        }

        if age_seconds < -tolerance {
            return Err(VerificationError::FromFuture);
        }

        let expected = self.compute(header.timestamp, payload)?;

        let matched = header
            .signatures
            .iter()
            .fold(subtle::Choice::from(0), |found, candidate| {
                found | expected.as_slice().ct_eq(candidate.as_slice())
            });

        if bool::from(matched) {
            Ok(())
        } else {
            Err(VerificationError::Mismatch)
        }
    }

    /// Build a header for `payload`, as the gateway would send it.
    ///
    /// # Errors
    ///
    /// Returns [`VerificationError::EmptySecret`] if the MAC cannot be keyed.
    pub fn sign_payload(&self, payload: &[u8], timestamp: i64) -> Result<String, VerificationError> {
        let signature = self.compute(timestamp, payload)?;

        Ok(format!("t={timestamp},v1={}", hex::encode(signature)))
    }

    fn compute(&self, timestamp: i64, payload: &[u8]) -> Result<Vec<u8>, VerificationError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_invalid_length| VerificationError::EmptySecret)?;

        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);

        Ok(mac.finalize().into_bytes().to_vec())
    }
}

/// What an event means to the payment pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// `payment_intent.succeeded`.
    Succeeded,

    /// `payment_intent.payment_failed`.
    Failed,

    /// Anything else; acknowledged without side effects.
    Other,
}

/// The object an event refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventObject {
    /// Gateway object id, e.g. the payment intent id.
    pub id: String,

    /// Metadata attached at creation.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Event payload wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventData {
    /// The object the event refers to.
    pub object: EventObject,
}

/// A gateway event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayEvent {
    /// Unique event id; the idempotency key.
    pub id: String,

    /// Event type, e.g. `payment_intent.succeeded`.
    #[serde(rename = "type")]
    pub event_type: String,

    /// Payload.
    pub data: EventData,
}

impl GatewayEvent {
    /// Parse a raw payload.
    ///
    /// # Errors
    ///
    /// Returns the JSON error for payloads that are not events.
    pub fn parse(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    /// Classify the event type.
    pub fn kind(&self) -> EventKind {
        match self.event_type.as_str() {
            "payment_intent.succeeded" => EventKind::Succeeded,
            "payment_intent.payment_failed" => EventKind::Failed,
            _ => EventKind::Other,
        }
    }

    /// Payment intent id the event refers to.
    pub fn intent_id(&self) -> &str {
        &self.data.object.id
    }

    /// Order code recorded in the intent metadata, if any.
    pub fn order_code(&self) -> Option<&str> {
        self.data
            .object
            .metadata
            .get(ORDER_CODE_METADATA)
            .map(String::as_str)
    }
}
