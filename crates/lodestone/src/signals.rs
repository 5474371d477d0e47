//! Signal handling for graceful server shutdown.
//!
//! This module provides cross-platform signal handling so the server can shut
//! down gracefully on termination signals. A second signal while shutdown is
//! in progress exits the process immediately.

use lodestone_core::ShutdownState;
use tokio::signal;
use tracing::{error, info, warn};

/// Waits for a termination signal and initiates shutdown on `shutdown_state`.
///
/// # Platform Support
///
/// * **Unix platforms**: Handles SIGINT and SIGTERM signals
/// * **Windows**: Handles Ctrl+C signal
///
/// # Returns
///
/// `Ok(())` once a signal was received, or an error if the handlers could not
/// be installed.
pub async fn setup_signal_handlers(shutdown_state: &ShutdownState) -> Result<(), Box<dyn std::error::Error>> {
    wait_for_signal().await?;
    info!("📡 Received shutdown signal - initiating graceful shutdown");
    shutdown_state.initiate_shutdown();
    Ok(())
}

/// Exits the process on the next termination signal.
pub fn spawn_forced_exit_handler() {
    tokio::spawn(async {
        if let Err(e) = wait_for_signal().await {
            error!("Failed to set up forced shutdown signal handler: {e}");
            return;
        }
        warn!("Shutdown signal received again! Exiting immediately.");
        std::process::exit(1);
    });
}

async fn wait_for_signal() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => (),
            _ = sigterm.recv() => ()
        }
    }

    #[cfg(windows)]
    signal::ctrl_c().await?;

    Ok(())
}
