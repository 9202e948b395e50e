//! Ledger service.

use async_trait::async_trait;
use atelier::ledger::{StockEntry, StockReason, reconcile};
use jiff::Timestamp;
use mockall::automock;

use crate::{
    database::Db,
    domain::{
        catalog::{records::VariantUuid, repository::PgCatalogRepository},
        ledger::{
            errors::LedgerServiceError,
            records::{StockAdjustment, VariantAudit},
            repository::{NewStockEntry, PgLedgerRepository},
        },
        reservations::repository::PgReservationsRepository,
    },
};

#[derive(Debug, Clone)]
pub struct PgLedgerService {
    db: Db,
    repository: PgLedgerRepository,
    catalog: PgCatalogRepository,
    reservations: PgReservationsRepository,
}

impl PgLedgerService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            repository: PgLedgerRepository::new(),
            catalog: PgCatalogRepository::new(),
            reservations: PgReservationsRepository::new(),
        }
    }
}

#[async_trait]
impl LedgerService for PgLedgerService {
    async fn history(&self, variant: VariantUuid) -> Result<Vec<StockEntry>, LedgerServiceError> {
        let mut tx = self.db.begin().await?;

        let entries = self.repository.variant_history(&mut tx, variant).await?;

        tx.commit().await?;

        Ok(entries)
    }

    #[tracing::instrument(skip(self, adjustment), fields(variant = %adjustment.variant, delta = adjustment.delta), err)]
    async fn adjust(&self, adjustment: StockAdjustment, now: Timestamp) -> Result<i64, LedgerServiceError> {
        if adjustment.delta == 0 {
            return Err(LedgerServiceError::ZeroDelta);
        }

        let mut tx = self.db.begin().await?;

        let Some((_, stock)) = self
            .catalog
            .lock_variants(&mut tx, &[adjustment.variant])
            .await?
            .into_iter()
            .next()
        else {
            return Err(LedgerServiceError::NotFound);
        };

        let held = self
            .reservations
            .active_holds(&mut tx, adjustment.variant, now)
            .await?;
        let resulting = stock.saturating_add(adjustment.delta);

        if resulting < held {
            return Err(LedgerServiceError::BelowHeld { held, resulting });
        }

        let stock = self
            .catalog
            .apply_stock_delta(&mut tx, adjustment.variant, adjustment.delta)
            .await?;

        self.repository
            .append_entry(&mut tx, &NewStockEntry {
                variant: adjustment.variant,
                delta: adjustment.delta,
                reason: StockReason::Manual,
                order: None,
                note: adjustment.note.as_deref(),
                now,
            })
            .await?;

        tx.commit().await?;

        tracing::info!(stock, "stock adjusted");

        Ok(stock)
    }

    async fn audit(&self) -> Result<Vec<VariantAudit>, LedgerServiceError> {
        let mut tx = self.db.begin().await?;

        let levels = self.catalog.list_stock_levels(&mut tx).await?;
        let movements = self.repository.sum_deltas(&mut tx).await?;

        tx.commit().await?;

        Ok(levels
            .into_iter()
            .map(|level| VariantAudit {
                reconciliation: reconcile(
                    level.variant.into_uuid(),
                    level.initial,
                    movements.get(&level.variant).copied(),
                    level.stock,
                ),
                sku: level.sku,
            })
            .collect())
    }
}

#[automock]
#[async_trait]
pub trait LedgerService: Send + Sync {
    /// Every stock movement of `variant`, oldest first.
    async fn history(&self, variant: VariantUuid) -> Result<Vec<StockEntry>, LedgerServiceError>;

    /// Apply a manual correction and return the new stock.
    ///
    /// Stock can never drop below the units held by active reservations.
    async fn adjust(&self, adjustment: StockAdjustment, now: Timestamp) -> Result<i64, LedgerServiceError>;

    /// Replay the ledger of every variant against its stored stock.
    async fn audit(&self) -> Result<Vec<VariantAudit>, LedgerServiceError>;
}
