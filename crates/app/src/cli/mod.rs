use atelier_app::database::{self, Db};
use clap::{Parser, Subcommand};

mod catalog;
mod coupons;
mod jobs;
mod ledger;
mod users;

#[derive(Debug, Parser)]
#[command(name = "atelier-app", about = "Atelier store administration", long_about = None)]
pub(crate) struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Users(users::UsersCommand),
    Catalog(catalog::CatalogCommand),
    Coupons(coupons::CouponsCommand),
    Ledger(ledger::LedgerCommand),
    Jobs(jobs::JobsCommand),
}

impl Cli {
    pub(crate) async fn run(self) -> Result<(), String> {
        match self.command {
            Commands::Users(command) => users::run(command).await,
            Commands::Catalog(command) => catalog::run(command).await,
            Commands::Coupons(command) => coupons::run(command).await,
            Commands::Ledger(command) => ledger::run(command).await,
            Commands::Jobs(command) => jobs::run(command).await,
        }
    }
}

/// Connect and bring the schema up to date.
pub(crate) async fn connect(database_url: &str) -> Result<Db, String> {
    let pool = database::connect(database_url)
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

    database::migrate(&pool)
        .await
        .map_err(|error| format!("failed to apply migrations: {error}"))?;

    Ok(Db::new(pool))
}
