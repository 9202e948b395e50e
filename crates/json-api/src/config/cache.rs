//! Cache Config

use std::time::Duration;

use clap::Args;

/// Cache, session and rate limit settings.
#[derive(Debug, Args)]
pub struct CacheConfig {
    /// Cart mutations allowed per buyer per minute
    #[arg(long, env = "CART_RATE_LIMIT_PER_MINUTE", default_value_t = 60_u32)]
    pub cart_rate_limit_per_minute: u32,

    /// How long a successful shipping quote is reused, in seconds
    #[arg(long, env = "SHIPPING_QUOTE_CACHE_TTL_SECONDS", default_value_t = 3_600_u64)]
    pub shipping_quote_cache_ttl_seconds: u64,

    /// How long an anonymous cart survives without changes, in seconds
    #[arg(long, env = "SESSION_CART_TTL_SECONDS", default_value_t = 1_209_600_u64)]
    pub session_cart_ttl_seconds: u64,
}

impl CacheConfig {
    pub(crate) fn quote_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.shipping_quote_cache_ttl_seconds)
    }

    pub(crate) fn session_cart_ttl(&self) -> Duration {
        Duration::from_secs(self.session_cart_ttl_seconds)
    }
}
