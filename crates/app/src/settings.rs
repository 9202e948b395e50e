//! Runtime settings handed to the services.
//!
//! Built by the binaries from their configuration; services never read the environment.

use std::{fmt, time::Duration};

use atelier::shipping::PostalCode;
use jiff::SignedDuration;
use zeroize::Zeroizing;

/// Card gateway connection.
#[derive(Clone)]
pub struct GatewaySettings {
    pub api_base: String,
    pub api_key: Zeroizing<String>,
    /// ISO 4217 code, e.g. `BRL`.
    pub currency: String,
    pub timeout: Duration,
}

impl fmt::Debug for GatewaySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewaySettings")
            .field("api_base", &self.api_base)
            .field("api_key", &"<redacted>")
            .field("currency", &self.currency)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Shipping carrier connection.
#[derive(Clone)]
pub struct CarrierSettings {
    pub api_base: String,
    pub token: Zeroizing<String>,
    pub origin: PostalCode,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl fmt::Debug for CarrierSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CarrierSettings")
            .field("api_base", &self.api_base)
            .field("token", &"<redacted>")
            .field("origin", &self.origin)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay", &self.retry_base_delay)
            .finish()
    }
}

/// Everything the services need at runtime.
#[derive(Clone)]
pub struct AppSettings {
    pub gateway: GatewaySettings,
    pub webhook_secret: Zeroizing<String>,
    pub webhook_tolerance: SignedDuration,
    pub carrier: CarrierSettings,
    pub reservation_ttl: SignedDuration,
    pub outbox_batch_size: u32,
    pub outbox_max_attempts: u32,
    pub cart_rate_limit: u32,
    pub quote_cache_ttl: Duration,
    pub session_cart_ttl: Duration,
    pub cart_signing_key: Zeroizing<String>,
    pub notification_from: String,
}

impl fmt::Debug for AppSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppSettings")
            .field("gateway", &self.gateway)
            .field("webhook_secret", &"<redacted>")
            .field("webhook_tolerance", &self.webhook_tolerance)
            .field("carrier", &self.carrier)
            .field("reservation_ttl", &self.reservation_ttl)
            .field("outbox_batch_size", &self.outbox_batch_size)
            .field("outbox_max_attempts", &self.outbox_max_attempts)
            .field("cart_rate_limit", &self.cart_rate_limit)
            .field("quote_cache_ttl", &self.quote_cache_ttl)
            .field("session_cart_ttl", &self.session_cart_ttl)
            .field("cart_signing_key", &"<redacted>")
            .field("notification_from", &self.notification_from)
            .finish()
    }
}

#[cfg(test)]
impl AppSettings {
    /// Settings pointing at unreachable hosts, for tests that mock every integration.
    pub(crate) fn for_tests() -> Self {
        Self {
            gateway: GatewaySettings {
                api_base: "http://127.0.0.1:9".to_string(),
                api_key: Zeroizing::new("sk_test".to_string()),
                currency: "BRL".to_string(),
                timeout: Duration::from_secs(1),
            },
            webhook_secret: Zeroizing::new("whsec_test".to_string()),
            webhook_tolerance: atelier::webhooks::DEFAULT_TOLERANCE,
            carrier: CarrierSettings {
                api_base: "http://127.0.0.1:9".to_string(),
                token: Zeroizing::new("carrier_test".to_string()),
                origin: "01001-000".parse().expect("valid postal code"),
                timeout: Duration::from_secs(1),
                max_retries: 0,
                retry_base_delay: Duration::from_millis(1),
            },
            reservation_ttl: atelier::reservations::DEFAULT_TTL,
            outbox_batch_size: 50,
            outbox_max_attempts: 3,
            cart_rate_limit: 60,
            quote_cache_ttl: Duration::from_secs(3600),
            session_cart_ttl: Duration::from_secs(1_209_600),
            cart_signing_key: Zeroizing::new("cart-signing-key".to_string()),
            notification_from: "loja@example.com".to_string(),
        }
    }
}
