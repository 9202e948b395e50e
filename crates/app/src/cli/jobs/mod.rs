use clap::{Args, Subcommand};

mod sweep;

#[derive(Debug, Args)]
pub(crate) struct JobsCommand {
    #[command(subcommand)]
    command: JobsSubcommand,
}

#[derive(Debug, Subcommand)]
enum JobsSubcommand {
    /// Expire lapsed reservations and time out unpaid orders once
    Sweep(sweep::SweepArgs),
}

pub(crate) async fn run(command: JobsCommand) -> Result<(), String> {
    match command.command {
        JobsSubcommand::Sweep(args) => sweep::run(args).await,
    }
}
