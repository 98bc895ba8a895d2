//! Signal handling for a clean exit.

use arsm_core::{ListenerRegistry, SimulatedDecoder};

/// Wait for Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(category = "shutdown", error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(category = "shutdown", error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!(category = "shutdown", "Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            tracing::info!(category = "shutdown", "Received SIGTERM, shutting down");
        }
    }
}

/// Remove every listener, then stop the decoder.
pub fn release(registry: &ListenerRegistry, decoder: &SimulatedDecoder) {
    let removed = registry.remove_all();
    decoder.shutdown();
    tracing::info!(category = "shutdown", listeners = removed, "Monitor released");
}
