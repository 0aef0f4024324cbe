//! Publish side of the pipeline.
//!
//! [`AmqpPublisher`] turns a [`UserRegisteredEvent`] into a persistent,
//! routed message. Callers on the request path go through
//! [`BestEffortPublisher`], which never lets a publish failure reach the
//! account-creation workflow: the failure is reported to a
//! [`PublishFailureObserver`] and the event is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use filmnesia_core::types::Timestamp;
use lapin::options::{BasicPublishOptions, ConfirmSelectOptions};
use lapin::BasicProperties;

use crate::config::BrokerConfig;
use crate::connection::BrokerConnection;
use crate::error::{BrokerError, PublishError};
use crate::event::{UserRegisteredEvent, CONTENT_TYPE_JSON};
use crate::topology::Topology;

/// AMQP delivery mode 2: the broker writes the message to disk once it
/// reaches a durable queue.
pub const DELIVERY_MODE_PERSISTENT: u8 = 2;

// ---------------------------------------------------------------------------
// EventPublisher
// ---------------------------------------------------------------------------

/// Something that can hand a [`UserRegisteredEvent`] to the broker.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &UserRegisteredEvent) -> Result<(), PublishError>;
}

// ---------------------------------------------------------------------------
// AmqpPublisher
// ---------------------------------------------------------------------------

/// Publishes events to the topology's exchange over a dedicated connection.
///
/// The connection is opened once at startup and reused. There is no
/// automatic reconnect: once the channel is gone every publish fails (and is
/// swallowed by [`BestEffortPublisher`]) until the process restarts.
pub struct AmqpPublisher {
    connection: BrokerConnection,
    topology: Topology,
}

impl AmqpPublisher {
    /// Connect, enable publisher confirms and declare the exchange.
    ///
    /// Any failure here is a startup failure; the caller should refuse to
    /// serve traffic.
    pub async fn connect(config: &BrokerConfig, topology: Topology) -> Result<Self, BrokerError> {
        let connection = BrokerConnection::open(config, "filmnesia-api publisher").await?;

        if let Err(e) = connection
            .channel()
            .confirm_select(ConfirmSelectOptions::default())
            .await
        {
            connection.close().await;
            return Err(BrokerError::Channel(e));
        }

        if let Err(e) = topology.declare_exchange(connection.channel()).await {
            connection.close().await;
            return Err(e);
        }

        Ok(Self {
            connection,
            topology,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Release channel then connection.
    pub async fn close(self) {
        self.connection.close().await;
    }
}

#[async_trait]
impl EventPublisher for AmqpPublisher {
    async fn publish(&self, event: &UserRegisteredEvent) -> Result<(), PublishError> {
        let payload = event.encode()?;

        let confirmation = self
            .connection
            .channel()
            .basic_publish(
                &self.topology.exchange,
                &self.topology.routing_key,
                BasicPublishOptions::default(),
                &payload,
                message_properties(event, Utc::now()),
            )
            .await?
            .await?;

        if confirmation.is_nack() {
            return Err(PublishError::Nacked {
                exchange: self.topology.exchange.clone(),
                routing_key: self.topology.routing_key.clone(),
            });
        }

        tracing::info!(
            user_id = %event.user_id,
            exchange = %self.topology.exchange,
            routing_key = %self.topology.routing_key,
            bytes = payload.len(),
            "UserRegistered event published"
        );
        Ok(())
    }
}

/// AMQP properties for one event: JSON content type, persistent delivery,
/// publish timestamp (unix seconds) and the user id as message id.
pub fn message_properties(event: &UserRegisteredEvent, published_at: Timestamp) -> BasicProperties {
    BasicProperties::default()
        .with_content_type(CONTENT_TYPE_JSON.to_string().into())
        .with_delivery_mode(DELIVERY_MODE_PERSISTENT)
        .with_timestamp(published_at.timestamp().max(0) as u64)
        .with_message_id(event.user_id.to_string().into())
}

// ---------------------------------------------------------------------------
// Failure observation
// ---------------------------------------------------------------------------

/// Receives every publish failure swallowed by [`BestEffortPublisher`].
pub trait PublishFailureObserver: Send + Sync {
    fn publish_failed(&self, event: &UserRegisteredEvent, error: &PublishError);
}

/// Logs each dropped event and counts them.
///
/// The count is what operators watch to detect silent event loss.
#[derive(Debug, Default)]
pub struct FailureCounter {
    failures: AtomicU64,
}

impl FailureCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

impl PublishFailureObserver for FailureCounter {
    fn publish_failed(&self, event: &UserRegisteredEvent, error: &PublishError) {
        let total = self.failures.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::warn!(
            user_id = %event.user_id,
            error = %error,
            dropped_total = total,
            "UserRegistered event dropped"
        );
    }
}

// ---------------------------------------------------------------------------
// BestEffortPublisher
// ---------------------------------------------------------------------------

/// What happened to a best-effort publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    Dropped,
}

/// Fire-and-forget wrapper used by the account-creation workflow.
///
/// Runs the publish inline on the caller's task. The result is never an
/// error: event delivery is deliberately not tied to the account write.
#[derive(Clone)]
pub struct BestEffortPublisher {
    inner: Arc<dyn EventPublisher>,
    observer: Arc<dyn PublishFailureObserver>,
}

impl BestEffortPublisher {
    pub fn new(inner: Arc<dyn EventPublisher>, observer: Arc<dyn PublishFailureObserver>) -> Self {
        Self { inner, observer }
    }

    pub async fn publish(&self, event: &UserRegisteredEvent) -> PublishOutcome {
        match self.inner.publish(event).await {
            Ok(()) => PublishOutcome::Published,
            Err(e) => {
                self.observer.publish_failed(event, &e);
                PublishOutcome::Dropped
            }
        }
    }
}
