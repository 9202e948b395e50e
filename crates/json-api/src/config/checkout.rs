//! Checkout Config

use std::time::Duration;

use clap::Args;
use jiff::SignedDuration;
use zeroize::Zeroizing;

/// Checkout, reservation and background job settings.
#[derive(Debug, Args)]
pub struct CheckoutConfig {
    /// How long checkout holds stock for an unpaid order, in seconds
    #[arg(long, env = "RESERVATION_TTL_SECONDS", default_value_t = 900_u64)]
    pub reservation_ttl_seconds: u64,

    /// Seconds between reservation sweeps
    #[arg(long, env = "SWEEPER_INTERVAL_SECONDS", default_value_t = 60_u64)]
    pub sweeper_interval_seconds: u64,

    /// Seconds between outbox drains
    #[arg(long, env = "OUTBOX_INTERVAL_SECONDS", default_value_t = 5_u64)]
    pub outbox_interval_seconds: u64,

    /// Outbox entries delivered per drain
    #[arg(long, env = "OUTBOX_BATCH_SIZE", default_value_t = 50_u32)]
    pub outbox_batch_size: u32,

    /// Delivery attempts before an outbox entry is parked
    #[arg(long, env = "OUTBOX_MAX_ATTEMPTS", default_value_t = 10_u32)]
    pub outbox_max_attempts: u32,

    /// Key signing cart fingerprints
    #[arg(long, env = "CART_SIGNING_KEY", hide_env_values = true)]
    pub cart_signing_key: String,

    /// Bearer token authorising operator actions; operator routes refuse everyone when empty
    #[arg(long, env = "OPERATOR_TOKEN", hide_env_values = true, default_value = "")]
    pub operator_token: String,

    /// Sender address on order notifications
    #[arg(long, env = "NOTIFICATION_FROM", default_value = "pedidos@atelier.local")]
    pub notification_from: String,
}

impl CheckoutConfig {
    pub(crate) fn reservation_ttl(&self) -> SignedDuration {
        SignedDuration::from_secs(i64::try_from(self.reservation_ttl_seconds).unwrap_or(i64::MAX))
    }

    pub(crate) fn sweeper_interval(&self) -> Duration {
        Duration::from_secs(self.sweeper_interval_seconds.max(1))
    }

    pub(crate) fn outbox_interval(&self) -> Duration {
        Duration::from_secs(self.outbox_interval_seconds.max(1))
    }

    pub(crate) fn cart_signing_key(&self) -> Zeroizing<String> {
        Zeroizing::new(self.cart_signing_key.clone())
    }

    pub(crate) fn operator_token(&self) -> Zeroizing<String> {
        Zeroizing::new(self.operator_token.clone())
    }
}
