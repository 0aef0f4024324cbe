//! Error types for the broker-facing side of the pipeline.

/// Failures talking to the broker: connection, channel, topology, consume
/// registration and acknowledgement.
///
/// Everything except [`BrokerError::Ack`] and [`BrokerError::Stream`] is a
/// startup error and fatal to the process that hits it.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// The TCP/AMQP connection could not be established.
    #[error("Failed to connect to broker: {0}")]
    Connect(#[source] lapin::Error),

    /// The connection came up but a channel could not be opened on it.
    #[error("Failed to open broker channel: {0}")]
    Channel(#[source] lapin::Error),

    /// Declaring an exchange or queue, or binding them, failed. Usually a
    /// property mismatch with an already-declared entity.
    #[error("Topology declaration failed for {entity} '{name}': {source}")]
    Topology {
        entity: &'static str,
        name: String,
        #[source]
        source: lapin::Error,
    },

    /// `basic.qos` or `basic.consume` was refused.
    #[error("Failed to start consuming from '{queue}': {source}")]
    Consume {
        queue: String,
        #[source]
        source: lapin::Error,
    },

    /// An ack or nack could not be delivered to the broker.
    #[error("Acknowledgement failed: {0}")]
    Ack(String),

    /// The delivery stream reported an error (typically the channel was
    /// closed by the broker).
    #[error("Delivery stream failed: {0}")]
    Stream(String),

    /// The reconnect policy gave up.
    #[error("Gave up reconnecting to broker after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },
}

/// Failures on the publish path. These never escape
/// [`BestEffortPublisher`](crate::publisher::BestEffortPublisher).
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The event could not be serialized.
    #[error("Failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),

    /// The broker call itself failed (connection down, channel closed, ...).
    #[error("Broker error: {0}")]
    Broker(#[from] lapin::Error),

    /// The broker answered the publisher confirm with a NACK.
    #[error("Broker rejected message for exchange '{exchange}' with routing key '{routing_key}'")]
    Nacked {
        exchange: String,
        routing_key: String,
    },
}

/// Outcome of a failed side-effect handler invocation.
///
/// The variant decides message disposition: transient failures are retried
/// and eventually requeued, permanent ones are dropped (or dead-lettered
/// upstream).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    #[error("Transient handler failure: {0}")]
    Transient(String),

    #[error("Permanent handler failure: {0}")]
    Permanent(String),
}

impl HandlerError {
    pub fn is_transient(&self) -> bool {
        matches!(self, HandlerError::Transient(_))
    }
}
