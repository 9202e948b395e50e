//! Shipping Config

use std::time::Duration;

use atelier_app::settings::CarrierSettings;
use clap::Args;
use zeroize::Zeroizing;

use super::ConfigError;

/// Shipping carrier settings.
#[derive(Debug, Args)]
pub struct ShippingConfig {
    /// Carrier REST API base URL
    #[arg(
        long,
        env = "CARRIER_API_BASE",
        default_value = "https://sandbox.melhorenvio.com.br"
    )]
    pub carrier_api_base: String,

    /// Carrier API token
    #[arg(long, env = "CARRIER_TOKEN", hide_env_values = true)]
    pub carrier_token: String,

    /// Postal code parcels ship from
    #[arg(long, env = "ORIGIN_POSTAL_CODE", default_value = "01001-000")]
    pub origin_postal_code: String,

    /// Carrier request timeout in seconds
    #[arg(long, env = "CARRIER_TIMEOUT_SECONDS", default_value_t = 10_u64)]
    pub carrier_timeout_seconds: u64,

    /// Retries after a timeout, connection failure or 5xx
    #[arg(long, env = "CARRIER_MAX_RETRIES", default_value_t = 3_u32)]
    pub carrier_max_retries: u32,

    /// First retry delay in milliseconds, doubled on every attempt
    #[arg(long, env = "CARRIER_RETRY_DELAY_MS", default_value_t = 200_u64)]
    pub carrier_retry_delay_ms: u64,
}

impl ShippingConfig {
    pub(crate) fn settings(&self) -> Result<CarrierSettings, ConfigError> {
        let origin = self
            .origin_postal_code
            .parse()
            .map_err(ConfigError::OriginPostalCode)?;

        Ok(CarrierSettings {
            api_base: self.carrier_api_base.clone(),
            token: Zeroizing::new(self.carrier_token.clone()),
            origin,
            timeout: Duration::from_secs(self.carrier_timeout_seconds),
            max_retries: self.carrier_max_retries,
            retry_base_delay: Duration::from_millis(self.carrier_retry_delay_ms),
        })
    }
}
