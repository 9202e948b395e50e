use clap::{Args, Subcommand};

mod adjust;
mod seed;

#[derive(Debug, Args)]
pub(crate) struct CatalogCommand {
    #[command(subcommand)]
    command: CatalogSubcommand,
}

#[derive(Debug, Subcommand)]
enum CatalogSubcommand {
    /// Load products and their variants from a YAML file
    Seed(seed::SeedCatalogArgs),

    /// Record a manual stock movement for a variant
    AdjustStock(adjust::AdjustStockArgs),
}

pub(crate) async fn run(command: CatalogCommand) -> Result<(), String> {
    match command.command {
        CatalogSubcommand::Seed(args) => seed::run(args).await,
        CatalogSubcommand::AdjustStock(args) => adjust::run(args).await,
    }
}
