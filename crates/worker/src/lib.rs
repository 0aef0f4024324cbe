//! Filmnesia notification worker.
//!
//! Consumes `UserRegistered` events and runs the welcome side effect. The
//! binary in `main.rs` only wires signals to [`run`].

use std::sync::Arc;
use std::time::Duration;

use filmnesia_events::delivery::email::EmailError;
use filmnesia_events::{
    BrokerConfig, BrokerError, ConsumerConfig, EmailConfig, EmailDelivery, EventHandler,
    Idempotent, NotificationConsumer, Topology, WelcomeLogger, WelcomeMailer,
};
use tokio_util::sync::CancellationToken;

/// Default upper bound on finishing the in-flight message after a shutdown
/// signal.
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("Failed to set up email delivery: {0}")]
    Email(#[from] EmailError),
}

/// Everything the worker reads from the environment.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub broker: BrokerConfig,
    pub consumer: ConsumerConfig,
    /// `None` when `SMTP_HOST` is unset; welcome messages are then only
    /// logged.
    pub email: Option<EmailConfig>,
    /// `SHUTDOWN_TIMEOUT_SECS`, default 30.
    pub shutdown_timeout: Duration,
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        let shutdown_secs = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS);

        Self {
            broker: BrokerConfig::from_env(),
            consumer: ConsumerConfig::from_env(),
            email: EmailConfig::from_env(),
            shutdown_timeout: Duration::from_secs(shutdown_secs),
        }
    }
}

/// Pick the side effect: e-mail when SMTP is configured, a log line
/// otherwise. Either way duplicates within the idempotency window are
/// skipped.
pub fn build_handler(config: &WorkerConfig) -> Result<Arc<dyn EventHandler>, WorkerError> {
    let window = config.consumer.idempotency_window;
    let handler: Arc<dyn EventHandler> = match &config.email {
        Some(email) => {
            tracing::info!(smtp_host = %email.smtp_host, "Welcome e-mails enabled");
            let mailer = WelcomeMailer::new(EmailDelivery::new(email.clone())?);
            Arc::new(Idempotent::new(mailer, window))
        }
        None => {
            tracing::info!("SMTP_HOST not set, welcome notifications are logged only");
            Arc::new(Idempotent::new(WelcomeLogger, window))
        }
    };
    Ok(handler)
}

/// Consume until `cancel` fires.
///
/// Returns an error if the broker cannot be reached at startup or if
/// reconnecting is given up later.
pub async fn run(config: WorkerConfig, cancel: CancellationToken) -> Result<(), WorkerError> {
    let handler = build_handler(&config)?;
    let consumer = NotificationConsumer::new(
        config.broker,
        config.consumer,
        Topology::user_registered(),
        handler,
    );

    consumer.run(cancel).await?;
    Ok(())
}
