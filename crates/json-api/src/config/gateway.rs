//! Gateway Config

use std::time::Duration;

use atelier_app::settings::GatewaySettings;
use clap::Args;
use jiff::SignedDuration;
use zeroize::Zeroizing;

/// Card gateway and webhook settings.
#[derive(Debug, Args)]
pub struct GatewayConfig {
    /// Gateway REST API base URL
    #[arg(long, env = "GATEWAY_API_BASE", default_value = "https://api.stripe.com")]
    pub gateway_api_base: String,

    /// Gateway secret API key
    #[arg(long, env = "GATEWAY_API_KEY", hide_env_values = true)]
    pub gateway_api_key: String,

    /// ISO 4217 currency charged
    #[arg(long, env = "GATEWAY_CURRENCY", default_value = "BRL")]
    pub gateway_currency: String,

    /// Gateway request timeout in seconds
    #[arg(long, env = "GATEWAY_TIMEOUT_SECONDS", default_value_t = 10_u64)]
    pub gateway_timeout_seconds: u64,

    /// Webhook signing secret
    #[arg(long, env = "WEBHOOK_SECRET", hide_env_values = true)]
    pub webhook_secret: String,

    /// Oldest webhook timestamp accepted, in seconds
    #[arg(long, env = "WEBHOOK_TOLERANCE_SECONDS", default_value_t = 300_u64)]
    pub webhook_tolerance_seconds: u64,
}

impl GatewayConfig {
    pub(crate) fn settings(&self) -> GatewaySettings {
        GatewaySettings {
            api_base: self.gateway_api_base.clone(),
            api_key: Zeroizing::new(self.gateway_api_key.clone()),
            currency: self.gateway_currency.to_uppercase(),
            timeout: Duration::from_secs(self.gateway_timeout_seconds),
        }
    }

    pub(crate) fn webhook_secret(&self) -> Zeroizing<String> {
        Zeroizing::new(self.webhook_secret.clone())
    }

    pub(crate) fn webhook_tolerance(&self) -> SignedDuration {
        SignedDuration::from_secs(i64::try_from(self.webhook_tolerance_seconds).unwrap_or(i64::MAX))
    }
}
