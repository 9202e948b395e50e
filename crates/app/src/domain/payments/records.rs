//! Payment Records

use std::fmt;

/// What a verified webhook did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WebhookOutcome {
    /// The event moved its order.
    Applied,

    /// The event id was processed before; nothing changed.
    Duplicate,

    /// Not a payment event, or its order already moved on.
    Ignored,

    /// Money was captured for an order that can no longer be fulfilled; a refund was queued.
    Compensated,
}

impl WebhookOutcome {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Duplicate => "duplicate",
            Self::Ignored => "ignored",
            Self::Compensated => "compensated",
        }
    }
}

impl fmt::Display for WebhookOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
