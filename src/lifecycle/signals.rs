//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGINT (Ctrl+C) or, on Unix, SIGTERM
//! - Translate the first one into a shutdown trigger

use crate::lifecycle::Shutdown;

/// Wait for a termination signal, then trigger `shutdown`.
pub async fn trigger_on_signal(shutdown: Shutdown) {
    wait_for_signal().await;
    tracing::info!("Termination signal received");
    shutdown.trigger();
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let ctrl_c = tokio::signal::ctrl_c();
    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                result = ctrl_c => log_ctrl_c_error(result),
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install SIGTERM handler");
            log_ctrl_c_error(ctrl_c.await);
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    log_ctrl_c_error(tokio::signal::ctrl_c().await);
}

fn log_ctrl_c_error(result: std::io::Result<()>) {
    if let Err(e) = result {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
    }
}
