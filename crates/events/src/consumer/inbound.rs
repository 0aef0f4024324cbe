//! One message handed to the delivery loop, independent of the broker
//! client.

use async_trait::async_trait;
use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicNackOptions};

use crate::error::BrokerError;

/// A delivery that must be settled exactly once with [`ack`](Self::ack) or
/// [`nack`](Self::nack).
#[async_trait]
pub trait InboundDelivery: Send + Sync {
    fn payload(&self) -> &[u8];

    /// Broker-assigned tag, unique per channel. Used for logging only.
    fn delivery_tag(&self) -> u64;

    /// `true` if the broker has delivered this message before.
    fn redelivered(&self) -> bool;

    async fn ack(&self) -> Result<(), BrokerError>;

    /// Negative acknowledgement. `requeue = false` drops the message (or
    /// routes it to a dead-letter exchange configured on the queue).
    async fn nack(&self, requeue: bool) -> Result<(), BrokerError>;
}

#[async_trait]
impl InboundDelivery for Delivery {
    fn payload(&self) -> &[u8] {
        &self.data
    }

    fn delivery_tag(&self) -> u64 {
        self.delivery_tag
    }

    fn redelivered(&self) -> bool {
        self.redelivered
    }

    async fn ack(&self) -> Result<(), BrokerError> {
        self.acker
            .ack(BasicAckOptions::default())
            .await
            .map(|_| ())
            .map_err(|e| BrokerError::Ack(e.to_string()))
    }

    async fn nack(&self, requeue: bool) -> Result<(), BrokerError> {
        self.acker
            .nack(BasicNackOptions {
                multiple: false,
                requeue,
            })
            .await
            .map(|_| ())
            .map_err(|e| BrokerError::Ack(e.to_string()))
    }
}
