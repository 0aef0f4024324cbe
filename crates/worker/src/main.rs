use std::process::ExitCode;

use filmnesia_worker::WorkerConfig;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "filmnesia_worker=debug,filmnesia_events=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env();
    let shutdown_timeout = config.shutdown_timeout;
    tracing::info!(
        consumer_tag = %config.consumer.consumer_tag,
        prefetch = config.consumer.prefetch,
        "Notification worker starting"
    );

    let cancel = CancellationToken::new();
    let mut worker = tokio::spawn(filmnesia_worker::run(config, cancel.clone()));

    let result = tokio::select! {
        result = &mut worker => result,
        () = shutdown_signal() => {
            cancel.cancel();
            match tokio::time::timeout(shutdown_timeout, &mut worker).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(?shutdown_timeout, "In-flight message did not finish in time, aborting");
                    worker.abort();
                    return ExitCode::FAILURE;
                }
            }
        }
    };

    match result {
        Ok(Ok(())) => {
            tracing::info!("Graceful shutdown complete");
            ExitCode::SUCCESS
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Notification worker failed");
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!(error = %e, "Notification worker task panicked");
            ExitCode::FAILURE
        }
    }
}

/// Wait for SIGINT or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
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
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
