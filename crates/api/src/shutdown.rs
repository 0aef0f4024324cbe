//! Bounded drain of the HTTP server after a shutdown signal.

use std::time::Duration;

use tokio::task::JoinHandle;

/// Wait up to `timeout` for the server task to finish its in-flight
/// requests, then abort it.
///
/// Returns only once the task has ended, so whatever it owned (the router
/// and the state inside it) has been dropped.
pub async fn drain_server(mut server: JoinHandle<std::io::Result<()>>, timeout: Duration) {
    match tokio::time::timeout(timeout, &mut server).await {
        Ok(Ok(Ok(()))) => tracing::info!("Server stopped accepting connections, cleaning up"),
        Ok(Ok(Err(e))) => tracing::error!(error = %e, "Server error during shutdown"),
        Ok(Err(e)) => tracing::error!(error = %e, "Server task failed"),
        Err(_) => {
            tracing::warn!(?timeout, "In-flight requests did not finish in time, aborting");
            server.abort();
            if let Err(e) = server.await {
                if !e.is_cancelled() {
                    tracing::error!(error = %e, "Server task failed while aborting");
                }
            }
        }
    }
}
