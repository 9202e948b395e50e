use atelier_app::domain::{
    catalog::records::VariantUuid,
    ledger::{LedgerService, PgLedgerService, records::StockAdjustment},
};
use clap::Args;
use jiff::Timestamp;
use uuid::Uuid;

#[derive(Debug, Args)]
pub(crate) struct AdjustStockArgs {
    /// Variant UUID
    #[arg(long)]
    variant: Uuid,

    /// Signed unit change, e.g. 12 for a restock or -1 for a damaged unit
    #[arg(long, allow_negative_numbers = true)]
    delta: i64,

    /// Free-form note kept on the ledger row
    #[arg(long)]
    note: Option<String>,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,
}

pub(crate) async fn run(args: AdjustStockArgs) -> Result<(), String> {
    let db = super::super::connect(&args.database_url).await?;

    let stock = PgLedgerService::new(db)
        .adjust(
            StockAdjustment {
                variant: VariantUuid::from_uuid(args.variant),
                delta: args.delta,
                note: args.note,
            },
            Timestamp::now(),
        )
        .await
        .map_err(|error| format!("failed to adjust stock: {error}"))?;

    println!("variant_uuid: {}", args.variant);
    println!("stock: {stock}");

    Ok(())
}
