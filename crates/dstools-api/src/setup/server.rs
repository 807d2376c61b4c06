//! Server startup and graceful shutdown

use anyhow::Result;
use axum::Router;
use dstools_core::Settings;

/// Start the server with graceful shutdown
pub async fn start_server(settings: &Settings, app: Router) -> Result<()> {
    tracing::info!(addr = %settings.bind_addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;

    tracing::info!(
        default_timeout_secs = settings.default_timeout_secs,
        max_items = settings.max_items,
        batch_max_operations = settings.batch_max_operations,
        environment = %settings.environment,
        "Server ready and accepting connections"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Resolves on Ctrl+C (SIGINT) or SIGTERM. A handler that cannot be installed is
/// logged and never fires, leaving the other one in charge.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal");
        },
    }

    tracing::info!("Shutting down gracefully...");
}
