use atelier_app::domain::users::{
    PgUsersService, UsersService,
    records::{NewUser, UserUuid},
};
use clap::Args;

#[derive(Debug, Args)]
pub(crate) struct CreateUserArgs {
    /// Buyer email, unique case-insensitively
    #[arg(long)]
    email: String,

    /// Display name
    #[arg(long, default_value = "")]
    name: String,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,
}

pub(crate) async fn run(args: CreateUserArgs) -> Result<(), String> {
    let db = super::super::connect(&args.database_url).await?;

    let issued = PgUsersService::new(db)
        .create_user(NewUser {
            uuid: UserUuid::new(),
            email: args.email,
            name: args.name,
        })
        .await
        .map_err(|error| format!("failed to create user: {error}"))?;

    println!("user_uuid: {}", issued.user.uuid);
    println!("email: {}", issued.user.email);
    println!("api_token: {}", issued.token);
    println!("store this token now; it is only shown once");

    Ok(())
}
