//! Ledger Records

use atelier::ledger::Reconciliation;

use crate::domain::catalog::records::VariantUuid;

/// Operator stock correction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockAdjustment {
    pub variant: VariantUuid,
    pub delta: i64,
    pub note: Option<String>,
}

/// Audit result for one variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantAudit {
    pub sku: String,
    pub reconciliation: Reconciliation,
}

impl VariantAudit {
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.reconciliation.is_balanced()
    }
}
