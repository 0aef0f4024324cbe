use std::net::{IpAddr, SocketAddr};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use filmnesia_api::config::ServerConfig;
use filmnesia_api::router::build_app_router;
use filmnesia_api::shutdown::drain_server;
use filmnesia_api::state::AppState;
use filmnesia_events::{AmqpPublisher, BestEffortPublisher, BrokerConfig, FailureCounter, Topology};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Anything that stops the service from starting.
#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("DATABASE_URL must be set")]
    MissingDatabaseUrl,
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("Broker error: {0}")]
    Broker(#[from] filmnesia_events::BrokerError),
    #[error("Invalid HOST address '{0}'")]
    InvalidHost(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "filmnesia_api=debug,filmnesia_events=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "User service failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), StartupError> {
    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url =
        std::env::var("DATABASE_URL").map_err(|_| StartupError::MissingDatabaseUrl)?;

    let pool = filmnesia_db::create_pool(&database_url).await?;
    tracing::info!("Database connection pool created");

    filmnesia_db::health_check(&pool).await?;
    tracing::info!("Database health check passed");

    filmnesia_db::run_migrations(&pool).await?;
    tracing::info!("Database migrations applied");

    // --- Event publisher ---
    // Refuse to serve traffic if the broker is unreachable at startup.
    let broker = BrokerConfig::from_env();
    let publisher = Arc::new(AmqpPublisher::connect(&broker, Topology::user_registered()).await?);
    let publish_failures = Arc::new(FailureCounter::new());
    tracing::info!("Event publisher ready");

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        notifier: BestEffortPublisher::new(publisher.clone(), publish_failures.clone()),
        publish_failures,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let host: IpAddr = config
        .host
        .parse()
        .map_err(|_| StartupError::InvalidHost(config.host.clone()))?;
    let addr = SocketAddr::new(host, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.wait_for(|stop| *stop).await;
            })
            .await
    });

    tokio::select! {
        result = &mut server => {
            // The server stopped on its own, before any shutdown signal.
            publisher_close(publisher).await;
            return match result {
                Ok(served) => served.map_err(StartupError::Io),
                Err(e) => Err(StartupError::Io(std::io::Error::other(e))),
            };
        }
        () = shutdown_signal() => {}
    }

    // --- Drain ---
    shutdown_tx.send_replace(true);
    let drain = Duration::from_secs(config.shutdown_timeout_secs);
    drain_server(server, drain).await;

    publisher_close(publisher).await;
    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Close the broker connection if no request still holds the publisher.
async fn publisher_close(publisher: Arc<AmqpPublisher>) {
    match Arc::try_unwrap(publisher) {
        Ok(publisher) => {
            publisher.close().await;
            tracing::info!("Event publisher closed");
        }
        Err(_) => tracing::warn!("Event publisher still in use, leaving connection to drop"),
    }
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
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
