use clap::{Args, Subcommand};

mod create;

#[derive(Debug, Args)]
pub(crate) struct UsersCommand {
    #[command(subcommand)]
    command: UsersSubcommand,
}

#[derive(Debug, Subcommand)]
enum UsersSubcommand {
    /// Register a buyer and issue their API token
    Create(create::CreateUserArgs),
}

pub(crate) async fn run(command: UsersCommand) -> Result<(), String> {
    match command.command {
        UsersSubcommand::Create(args) => create::run(args).await,
    }
}
