//! OS signal handling.
//!
//! SIGINT (Ctrl-C) and, on Unix, SIGTERM both mean "drain and exit".
//! There is no reload signal.

use std::io;

use crate::lifecycle::Shutdown;

/// Resolves on the first termination signal.
pub async fn shutdown_signal() -> io::Result<()> {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = ctrl_c => result?,
            _ = term.recv() => {}
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await?;

    Ok(())
}

/// Wait for a termination signal and fire `shutdown`.
pub async fn watch_signals(shutdown: &Shutdown) {
    match shutdown_signal().await {
        Ok(()) => tracing::info!("Termination signal received"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for signals, shutting down"),
    }
    shutdown.trigger();
}
