//! Background jobs
//!
//! The reservation sweeper and the outbox drain run on fixed intervals until shutdown is
//! signalled. A failed pass is logged and retried on the next tick.

use std::{sync::Arc, time::Duration};

use jiff::Timestamp;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, error, info};

use atelier_app::domain::{outbox::OutboxService, reservations::ReservationsService};

use crate::observability::metrics;

/// Spawn the sweeper and the outbox drain.
pub(crate) fn spawn(
    reservations: Arc<dyn ReservationsService>,
    outbox: Arc<dyn OutboxService>,
    sweeper_every: Duration,
    outbox_every: Duration,
    shutdown: &watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    vec![
        tokio::spawn(run_sweeper(reservations, sweeper_every, shutdown.clone())),
        tokio::spawn(run_outbox(outbox, outbox_every, shutdown.clone())),
    ]
}

pub(crate) async fn run_sweeper(
    reservations: Arc<dyn ReservationsService>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(every_seconds = every.as_secs(), "reservation sweeper started");

    loop {
        match reservations.sweep_expired(Timestamp::now()).await {
            Ok(report) => {
                metrics::observe_sweep(report.timed_out.len(), report.orphans_expired);

                if report.timed_out.is_empty() && report.orphans_expired == 0 {
                    debug!("no lapsed reservations");
                } else {
                    info!(
                        timed_out = report.timed_out.len(),
                        orphans_expired = report.orphans_expired,
                        "released lapsed reservations"
                    );
                }
            }
            Err(sweep_error) => error!("reservation sweep failed: {sweep_error}"),
        }

        tokio::select! {
            () = tokio::time::sleep(every) => {}
            _ = shutdown.changed() => break,
        }
    }

    info!("reservation sweeper stopped");
}

pub(crate) async fn run_outbox(
    outbox: Arc<dyn OutboxService>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(every_seconds = every.as_secs(), "outbox drain started");

    loop {
        match outbox.drain_once(Timestamp::now()).await {
            Ok(report) => {
                metrics::observe_outbox(report.processed, report.retried, report.failed);

                if !report.is_empty() {
                    info!(
                        processed = report.processed,
                        retried = report.retried,
                        failed = report.failed,
                        "drained outbox"
                    );
                }
            }
            Err(drain_error) => error!("outbox drain failed: {drain_error}"),
        }

        tokio::select! {
            () = tokio::time::sleep(every) => {}
            _ = shutdown.changed() => break,
        }
    }

    info!("outbox drain stopped");
}

#[cfg(test)]
mod tests {
    use atelier_app::domain::{
        outbox::{MockOutboxService, records::DrainReport},
        reservations::{MockReservationsService, ReservationsServiceError, records::SweepReport},
    };
    use testresult::TestResult;

    use super::*;

    #[tokio::test]
    async fn sweeper_runs_once_then_stops_on_shutdown() -> TestResult {
        let mut reservations = MockReservationsService::new();

        reservations
            .expect_sweep_expired()
            .once()
            .return_once(|_| {
                Ok(SweepReport {
                    timed_out: vec!["7K3M9Q2X".to_string()],
                    orphans_expired: 1,
                })
            });

        reservations.expect_list_for_order().never();

        let (tx, rx) = watch::channel(false);

        tx.send(true)?;

        tokio::time::timeout(
            Duration::from_secs(5),
            run_sweeper(Arc::new(reservations), Duration::from_secs(3_600), rx),
        )
        .await?;

        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn outbox_drains_every_interval_until_shutdown() -> TestResult {
        let mut outbox = MockOutboxService::new();

        outbox
            .expect_drain_once()
            .times(3)
            .returning(|_| Ok(DrainReport::default()));

        let (tx, rx) = watch::channel(false);

        let task = tokio::spawn(run_outbox(Arc::new(outbox), Duration::from_secs(5), rx));

        tokio::time::sleep(Duration::from_secs(12)).await;

        tx.send(true)?;
        task.await?;

        Ok(())
    }

    #[tokio::test]
    async fn failed_pass_is_logged_and_the_loop_honours_a_dropped_sender() -> TestResult {
        let mut reservations = MockReservationsService::new();

        reservations
            .expect_sweep_expired()
            .once()
            .return_once(|_| Err(ReservationsServiceError::InvalidData));

        let (tx, rx) = watch::channel(false);

        drop(tx);

        tokio::time::timeout(
            Duration::from_secs(5),
            run_sweeper(Arc::new(reservations), Duration::from_secs(3_600), rx),
        )
        .await?;

        Ok(())
    }
}
