use clap::{Args, Subcommand};

mod audit;

#[derive(Debug, Args)]
pub(crate) struct LedgerCommand {
    #[command(subcommand)]
    command: LedgerSubcommand,
}

#[derive(Debug, Subcommand)]
enum LedgerSubcommand {
    /// Reconcile every variant's stock against its ledger
    Audit(audit::AuditArgs),
}

pub(crate) async fn run(command: LedgerCommand) -> Result<(), String> {
    match command.command {
        LedgerSubcommand::Audit(args) => audit::run(args).await,
    }
}
