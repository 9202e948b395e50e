//! Outbox Records

use jiff::Timestamp;

use crate::uuids::TypedUuid;

/// Outbox Entry UUID
pub type OutboxEntryUuid = TypedUuid<OutboxEntry>;

/// A claimed, undelivered entry.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxEntry {
    pub uuid: OutboxEntryUuid,
    pub topic: String,
    pub payload: serde_json::Value,
    /// Failed deliveries so far.
    pub attempts: u32,
    pub available_at: Timestamp,
    pub created_at: Timestamp,
}

/// Counts from one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub processed: usize,
    pub retried: usize,
    pub failed: usize,
}

impl DrainReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.processed == 0 && self.retried == 0 && self.failed == 0
    }
}
