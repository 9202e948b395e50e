//! Short-TTL key-value cache
//!
//! Holds rate-limit counters, shipping quotes and anonymous session carts. Everything stored here
//! is advisory or reconstructible; callers degrade when the cache fails.

use std::time::Duration;

use async_trait::async_trait;
use mockall::automock;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tokio::{sync::Mutex, time::Instant};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    #[error("cached value for {0} is not a counter")]
    NotACounter(String),
}

#[automock]
#[async_trait]
pub trait SharedCache: Send + Sync {
    /// Read a live value.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store a value that expires after `ttl`.
    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration)
    -> Result<(), CacheError>;

    /// Remove a value. Missing keys are not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Increment a counter, creating it with `ttl` when absent or expired. Returns the new count.
    ///
    /// The expiry is fixed when the counter is created, so repeated increments form a fixed window.
    async fn increment_with_ttl(&self, key: &str, ttl: Duration) -> Result<u64, CacheError>;
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Writes sweep expired entries at most this often.
const PURGE_EVERY: Duration = Duration::from_secs(30);

#[derive(Debug, Default)]
struct Entries {
    map: FxHashMap<String, Entry>,
    purged_at: Option<Instant>,
}

impl Entries {
    fn purge(&mut self, now: Instant) -> usize {
        let before = self.map.len();

        self.map.retain(|_, entry| entry.is_live(now));
        self.purged_at = Some(now);

        before - self.map.len()
    }

    fn purge_if_due(&mut self, now: Instant) {
        let due = self
            .purged_at
            .is_none_or(|purged_at| now.saturating_duration_since(purged_at) >= PURGE_EVERY);

        if due {
            self.purge(now);
        }
    }
}

/// Process-local TTL map. Expired entries are swept on write.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<Entries>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired entries now.
    pub async fn purge_expired(&self) -> usize {
        self.entries.lock().await.purge(Instant::now())
    }

    /// Entries held, live or not yet swept.
    pub async fn entry_count(&self) -> usize {
        self.entries.lock().await.map.len()
    }
}

#[async_trait]
impl SharedCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let entries = self.entries.lock().await;

        Ok(entries
            .map
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        entries.purge_if_due(now);
        entries.map.insert(key.to_string(), Entry {
            value,
            expires_at: now + ttl,
        });

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.lock().await.map.remove(key);

        Ok(())
    }

    async fn increment_with_ttl(&self, key: &str, ttl: Duration) -> Result<u64, CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        entries.purge_if_due(now);

        match entries.map.get_mut(key).filter(|entry| entry.is_live(now)) {
            Some(entry) => {
                let count = entry
                    .value
                    .parse::<u64>()
                    .map_err(|_not_a_number| CacheError::NotACounter(key.to_string()))?
                    .saturating_add(1);

                entry.value = count.to_string();

                Ok(count)
            }
            None => {
                entries.map.insert(
                    key.to_string(),
                    Entry {
                        value: "1".to_string(),
                        expires_at: now + ttl,
                    },
                );

                Ok(1)
            }
        }
    }
}
