//! Exchange, queue and binding that publisher and consumer both declare.
//!
//! Both sides build their declare options from the functions in this module,
//! so the "identical topology" requirement holds by construction rather
//! than by convention. Every declaration is idempotent: re-declaring an
//! entity with matching properties is a no-op on the broker, a mismatch is
//! a channel error surfaced as [`BrokerError::Topology`].

use lapin::options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{Channel, ExchangeKind};

use crate::error::BrokerError;

pub const USER_EVENTS_EXCHANGE: &str = "user_events";
pub const USER_REGISTERED_QUEUE: &str = "user.registered.notifications.queue";
pub const USER_REGISTERED_ROUTING_KEY: &str = "user.registered";

/// Names of the broker entities one producer/consumer pairing agrees on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub exchange: String,
    pub queue: String,
    pub routing_key: String,
}

impl Topology {
    /// The `user.registered` pipeline.
    pub fn user_registered() -> Self {
        Self {
            exchange: USER_EVENTS_EXCHANGE.to_string(),
            queue: USER_REGISTERED_QUEUE.to_string(),
            routing_key: USER_REGISTERED_ROUTING_KEY.to_string(),
        }
    }

    /// Declare the durable direct exchange. Publisher side.
    pub async fn declare_exchange(&self, channel: &Channel) -> Result<(), BrokerError> {
        channel
            .exchange_declare(
                &self.exchange,
                ExchangeKind::Direct,
                exchange_options(),
                FieldTable::default(),
            )
            .await
            .map_err(|source| BrokerError::Topology {
                entity: "exchange",
                name: self.exchange.clone(),
                source,
            })?;
        tracing::debug!(exchange = %self.exchange, "Exchange declared");
        Ok(())
    }

    /// Declare exchange and queue, then bind them. Consumer side.
    pub async fn declare(&self, channel: &Channel) -> Result<(), BrokerError> {
        self.declare_exchange(channel).await?;

        channel
            .queue_declare(&self.queue, queue_options(), FieldTable::default())
            .await
            .map_err(|source| BrokerError::Topology {
                entity: "queue",
                name: self.queue.clone(),
                source,
            })?;
        tracing::debug!(queue = %self.queue, "Queue declared");

        channel
            .queue_bind(
                &self.queue,
                &self.exchange,
                &self.routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|source| BrokerError::Topology {
                entity: "binding",
                name: format!("{} -> {}", self.routing_key, self.queue),
                source,
            })?;

        tracing::info!(
            exchange = %self.exchange,
            queue = %self.queue,
            routing_key = %self.routing_key,
            "Topology ready"
        );
        Ok(())
    }
}

impl Default for Topology {
    fn default() -> Self {
        Self::user_registered()
    }
}

/// Durable, not auto-deleted, not internal.
pub fn exchange_options() -> ExchangeDeclareOptions {
    ExchangeDeclareOptions {
        durable: true,
        ..ExchangeDeclareOptions::default()
    }
}

/// Durable, non-exclusive, not auto-deleted.
pub fn queue_options() -> QueueDeclareOptions {
    QueueDeclareOptions {
        durable: true,
        exclusive: false,
        auto_delete: false,
        ..QueueDeclareOptions::default()
    }
}
