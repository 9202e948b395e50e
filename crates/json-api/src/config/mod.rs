//! Server configuration module

use atelier_app::settings::AppSettings;
use clap::Parser;
use thiserror::Error;

use crate::config::{
    cache::CacheConfig,
    checkout::CheckoutConfig,
    db::DatabaseConfig,
    gateway::GatewayConfig,
    observability::{LoggingConfig, ObservabilityConfig},
    server::ServerRuntimeConfig,
    shipping::ShippingConfig,
};

pub(crate) mod cache;
pub(crate) mod checkout;
pub(crate) mod db;
pub(crate) mod gateway;
pub(crate) mod observability;
pub(crate) mod server;
pub(crate) mod shipping;

/// Configuration values that parse but cannot be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("ORIGIN_POSTAL_CODE is not a valid postal code: {0}")]
    OriginPostalCode(#[source] atelier::shipping::ShippingError),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Atelier JSON API Server configuration
#[derive(Debug, Parser)]
#[command(name = "atelier-json", about = "Atelier JSON API Server", long_about = None)]
pub struct ServerConfig {
    /// Server network settings.
    #[command(flatten)]
    pub server: ServerRuntimeConfig,

    /// Logging output settings.
    #[command(flatten)]
    pub logging: LoggingConfig,

    /// Observability (traces/metrics/profiles) settings.
    #[command(flatten)]
    pub observability: ObservabilityConfig,

    /// Application database settings.
    #[command(flatten)]
    pub database: DatabaseConfig,

    /// Checkout, reservation and background job settings.
    #[command(flatten)]
    pub checkout: CheckoutConfig,

    /// Card gateway and webhook settings.
    #[command(flatten)]
    pub gateway: GatewayConfig,

    /// Shipping carrier settings.
    #[command(flatten)]
    pub shipping: ShippingConfig,

    /// Cache, session and rate limit settings.
    #[command(flatten)]
    pub cache: CacheConfig,
}

impl ServerConfig {
    /// Load configuration from environment and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be parsed
    pub fn load() -> Result<Self, clap::Error> {
        // Load .env file if present (ignore if missing)
        _ = dotenvy::dotenv();

        Self::try_parse()
    }

    /// Get the socket address for binding
    #[must_use]
    pub fn socket_addr(&self) -> String {
        self.server.socket_addr()
    }

    /// Settings handed to the application services.
    ///
    /// # Errors
    ///
    /// Returns an error when a value is out of range or the origin postal code is malformed.
    pub fn app_settings(&self) -> Result<AppSettings, ConfigError> {
        if self.checkout.reservation_ttl_seconds == 0 {
            return Err(ConfigError::Zero("RESERVATION_TTL_SECONDS"));
        }

        if self.checkout.outbox_batch_size == 0 {
            return Err(ConfigError::Zero("OUTBOX_BATCH_SIZE"));
        }

        Ok(AppSettings {
            gateway: self.gateway.settings(),
            webhook_secret: self.gateway.webhook_secret(),
            webhook_tolerance: self.gateway.webhook_tolerance(),
            carrier: self.shipping.settings()?,
            reservation_ttl: self.checkout.reservation_ttl(),
            outbox_batch_size: self.checkout.outbox_batch_size,
            outbox_max_attempts: self.checkout.outbox_max_attempts,
            cart_rate_limit: self.cache.cart_rate_limit_per_minute,
            quote_cache_ttl: self.cache.quote_cache_ttl(),
            session_cart_ttl: self.cache.session_cart_ttl(),
            cart_signing_key: self.checkout.cart_signing_key(),
            notification_from: self.checkout.notification_from.clone(),
        })
    }
}
