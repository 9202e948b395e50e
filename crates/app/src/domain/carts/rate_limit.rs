//! Per-buyer cart mutation limits.
//!
//! Fixed clock-aligned windows counted in the shared cache. When the cache fails the limiter
//! keeps counting in process, which loosens isolation between replicas but never lets a buyer
//! through unchecked on this one.

use std::{sync::Arc, time::Duration};

use jiff::Timestamp;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::{cache::SharedCache, domain::users::records::UserUuid};

/// A denied mutation and how long until the window resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("rate limited; retry in {}s", retry_after.as_secs())]
pub struct RateLimited {
    pub retry_after: Duration,
}

pub struct CartRateLimiter {
    cache: Arc<dyn SharedCache>,
    limit: u32,
    window: Duration,
    fallback: Mutex<FxHashMap<String, u64>>,
}

impl CartRateLimiter {
    #[must_use]
    pub fn new(cache: Arc<dyn SharedCache>, limit: u32) -> Self {
        Self::with_window(cache, limit, Duration::from_secs(60))
    }

    #[must_use]
    pub fn with_window(cache: Arc<dyn SharedCache>, limit: u32, window: Duration) -> Self {
        Self {
            cache,
            limit,
            window: window.max(Duration::from_secs(1)),
            fallback: Mutex::new(FxHashMap::default()),
        }
    }

    /// Count one mutation by `user`.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimited`] once the user exceeds the limit inside the current window.
    pub async fn check(&self, user: UserUuid, now: Timestamp) -> Result<(), RateLimited> {
        let window_secs = self.window.as_secs().max(1);
        let now_secs = u64::try_from(now.as_second()).unwrap_or_default();
        let window = now_secs / window_secs;
        let key = format!("cart:rl:{user}:{window}");

        let count = match self.cache.increment_with_ttl(&key, self.window).await {
            Ok(count) => count,
            Err(error) => {
                tracing::warn!(%error, "rate limit cache unavailable; counting in process");

                self.count_locally(key, window).await
            }
        };

        if count > u64::from(self.limit) {
            let retry_after = Duration::from_secs(window_secs - now_secs % window_secs);

            tracing::info!(%user, count, "cart mutation rate limited");

            return Err(RateLimited { retry_after });
        }

        Ok(())
    }

    async fn count_locally(&self, key: String, window: u64) -> u64 {
        let mut counters = self.fallback.lock().await;
        let suffix = format!(":{window}");

        counters.retain(|key, _| key.ends_with(&suffix));

        let count = counters.entry(key).or_default();

        *count = count.saturating_add(1);

        *count
    }
}

impl std::fmt::Debug for CartRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartRateLimiter")
            .field("limit", &self.limit)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}
