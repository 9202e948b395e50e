//! Cached shipping quotes.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use atelier::shipping::{Package, PostalCode, QuoteKey, QuoteOutcome, QuoteWarning};
use mockall::automock;

use crate::{
    cache::SharedCache,
    domain::shipping::carrier::{CarrierClient, CarrierError},
};

/// Quote shipping for a set of parcels. Never fails: carrier trouble yields an empty outcome
/// with a warning.
#[automock]
#[async_trait]
pub trait ShippingQuoter: Send + Sync {
    async fn quote(&self, destination: PostalCode, packages: Vec<Package>) -> QuoteOutcome;
}

/// Quotes from the carrier, cached per route and parcel set.
pub struct CarrierQuoter {
    carrier: Arc<dyn CarrierClient>,
    cache: Arc<dyn SharedCache>,
    origin: PostalCode,
    ttl: Duration,
}

impl CarrierQuoter {
    #[must_use]
    pub fn new(
        carrier: Arc<dyn CarrierClient>,
        cache: Arc<dyn SharedCache>,
        origin: PostalCode,
        ttl: Duration,
    ) -> Self {
        Self {
            carrier,
            cache,
            origin,
            ttl,
        }
    }

    async fn cached(&self, key: &str) -> Option<QuoteOutcome> {
        match self.cache.get(key).await {
            Ok(Some(json)) => serde_json::from_str(&json)
                .inspect_err(|error| tracing::warn!(%error, "cached quote unreadable"))
                .ok(),
            Ok(None) => None,
            Err(error) => {
                tracing::warn!(%error, "quote cache unavailable");

                None
            }
        }
    }

    async fn remember(&self, key: &str, outcome: &QuoteOutcome) {
        let json = match serde_json::to_string(outcome) {
            Ok(json) => json,
            Err(error) => {
                tracing::warn!(%error, "quote not cached");

                return;
            }
        };

        if let Err(error) = self.cache.set_with_ttl(key, json, self.ttl).await {
            tracing::warn!(%error, "quote not cached");
        }
    }
}

#[async_trait]
impl ShippingQuoter for CarrierQuoter {
    #[tracing::instrument(skip(self, packages), fields(%destination))]
    async fn quote(&self, destination: PostalCode, packages: Vec<Package>) -> QuoteOutcome {
        if packages.is_empty() {
            return QuoteOutcome::unavailable(QuoteWarning::NoOptions);
        }

        let key = QuoteKey::new(self.origin.clone(), destination.clone(), &packages).cache_key();

        if let Some(outcome) = self.cached(&key).await {
            tracing::debug!("quote served from cache");

            return outcome;
        }

        let quotes = match self
            .carrier
            .quote(self.origin.clone(), destination, packages)
            .await
        {
            Ok(quotes) => quotes,
            Err(error) => {
                let warning = match error {
                    CarrierError::Rejected { .. } => QuoteWarning::CarrierRejected,
                    _ => QuoteWarning::CarrierUnavailable,
                };

                tracing::warn!(%error, ?warning, "no shipping quotes available");

                return QuoteOutcome::unavailable(warning);
            }
        };

        let options = quotes
            .into_iter()
            .filter_map(|quote| {
                quote
                    .into_option()
                    .inspect_err(|error| tracing::warn!(%error, "carrier option skipped"))
                    .ok()
                    .flatten()
            })
            .collect();

        let outcome = QuoteOutcome::from_options(options);

        if outcome.warning.is_none() {
            self.remember(&key, &outcome).await;
        }

        outcome
    }
}

impl std::fmt::Debug for CarrierQuoter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CarrierQuoter")
            .field("origin", &self.origin)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
