use atelier_app::domain::reservations::{PgReservationsService, ReservationsService};
use clap::Args;
use jiff::Timestamp;

#[derive(Debug, Args)]
pub(crate) struct SweepArgs {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,
}

pub(crate) async fn run(args: SweepArgs) -> Result<(), String> {
    let db = super::super::connect(&args.database_url).await?;

    let report = PgReservationsService::new(db)
        .sweep_expired(Timestamp::now())
        .await
        .map_err(|error| format!("failed to sweep reservations: {error}"))?;

    for code in &report.timed_out {
        println!("timed_out: {code}");
    }

    println!("orders_timed_out: {}", report.timed_out.len());
    println!("orphan_holds_expired: {}", report.orphans_expired);

    Ok(())
}
