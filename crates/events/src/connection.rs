//! Owned broker connection + channel pair.
//!
//! Each component (publisher, consumer) opens its own [`BrokerConnection`]
//! at startup and is the only user of it. There is no process-wide
//! connection singleton.

use lapin::{Channel, Connection, ConnectionProperties};

use crate::config::BrokerConfig;
use crate::error::BrokerError;

/// AMQP `reply-success`.
const REPLY_SUCCESS: u16 = 200;

pub struct BrokerConnection {
    connection: Connection,
    channel: Channel,
}

impl BrokerConnection {
    /// Connect to the broker and open one channel.
    ///
    /// `connection_name` shows up in the broker's management UI. If the
    /// channel cannot be opened the connection is closed before returning.
    pub async fn open(config: &BrokerConfig, connection_name: &str) -> Result<Self, BrokerError> {
        tracing::info!(connection_name, "Connecting to broker");

        let properties =
            ConnectionProperties::default().with_connection_name(connection_name.to_string().into());
        let connection = Connection::connect(&config.url, properties)
            .await
            .map_err(BrokerError::Connect)?;

        let channel = match connection.create_channel().await {
            Ok(channel) => channel,
            Err(e) => {
                if let Err(close_err) = connection.close(REPLY_SUCCESS, "channel open failed").await {
                    tracing::debug!(error = %close_err, "Connection already closed");
                }
                return Err(BrokerError::Channel(e));
            }
        };

        tracing::info!(connection_name, channel_id = channel.id(), "Broker connection open");
        Ok(Self {
            connection,
            channel,
        })
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// `true` while both the connection and the channel are usable.
    pub fn is_connected(&self) -> bool {
        self.connection.status().connected() && self.channel.status().connected()
    }

    /// Release the channel, then the connection. Either may already be
    /// closed (broker-initiated close, network loss); that is logged and
    /// otherwise ignored.
    pub async fn close(self) {
        match self.channel.close(REPLY_SUCCESS, "shutdown").await {
            Ok(()) => tracing::debug!("Broker channel closed"),
            Err(e) => tracing::debug!(error = %e, "Broker channel was already closed"),
        }
        match self.connection.close(REPLY_SUCCESS, "shutdown").await {
            Ok(()) => tracing::info!("Broker connection closed"),
            Err(e) => tracing::debug!(error = %e, "Broker connection was already closed"),
        }
    }
}
