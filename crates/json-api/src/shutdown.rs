//! Graceful shutdown
//!
//! On Ctrl+C or SIGTERM the background jobs are told to stop and the server drains in-flight
//! requests.

use std::io;

use salvo::server::ServerHandle;
use thiserror::Error;
use tokio::{signal, sync::watch};
use tracing::{info, warn};

#[derive(Debug, Error)]
pub(crate) enum ShutdownSignalError {
    #[error("failed to install Ctrl+C handler: {0}")]
    CtrlC(#[source] io::Error),

    #[cfg(unix)]
    #[error("failed to install SIGTERM handler: {0}")]
    SigTerm(#[source] io::Error),
}

async fn terminate() -> Result<(), ShutdownSignalError> {
    #[cfg(unix)]
    {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .map_err(ShutdownSignalError::SigTerm)?
            .recv()
            .await;

        Ok(())
    }

    #[cfg(not(unix))]
    {
        std::future::pending::<Result<(), ShutdownSignalError>>().await
    }
}

pub(crate) async fn listen(
    handle: ServerHandle,
    jobs: watch::Sender<bool>,
) -> Result<(), ShutdownSignalError> {
    tokio::select! {
        result = signal::ctrl_c() => {
            result.map_err(ShutdownSignalError::CtrlC)?;
            info!("ctrl_c signal received");
        }
        result = terminate() => {
            result?;
            info!("terminate signal received");
        }
    };

    stop(&handle, &jobs);

    Ok(())
}

/// Tell the jobs to stop, then stop accepting connections.
pub(crate) fn stop(handle: &ServerHandle, jobs: &watch::Sender<bool>) {
    if jobs.send(true).is_err() {
        warn!("background jobs already stopped");
    }

    handle.stop_graceful(None);
}
