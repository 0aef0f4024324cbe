//! Filmnesia user-event notification pipeline.
//!
//! - [`UserRegisteredEvent`]: the wire contract.
//! - [`Topology`]: exchange/queue/binding declared identically by both
//!   sides.
//! - [`AmqpPublisher`] / [`BestEffortPublisher`]: publish side; failures
//!   are observed, never propagated to the account-creation workflow.
//! - [`DeliveryLoop`] / [`NotificationConsumer`]: consume side with manual
//!   acks, three-way handler outcome, cooperative cancellation and
//!   reconnect.
//! - [`EventHandler`] implementations: [`WelcomeLogger`],
//!   [`WelcomeMailer`], and the [`Idempotent`] wrapper.

pub mod backoff;
pub mod config;
pub mod connection;
pub mod consumer;
pub mod delivery;
pub mod error;
pub mod event;
pub mod handler;
pub mod publisher;
pub mod topology;

pub use backoff::{Backoff, ReconnectPolicy, RetryPolicy};
pub use config::{BrokerConfig, ConsumerConfig};
pub use connection::BrokerConnection;
pub use consumer::{
    ConsumerState, DeliveryLoop, Disposition, HandlerOutcome, InboundDelivery, LoopExit,
    NotificationConsumer,
};
pub use delivery::email::{EmailConfig, EmailDelivery, WelcomeMailer};
pub use error::{BrokerError, HandlerError, PublishError};
pub use event::UserRegisteredEvent;
pub use handler::{EventHandler, Idempotent, WelcomeLogger};
pub use publisher::{
    AmqpPublisher, BestEffortPublisher, EventPublisher, FailureCounter, PublishFailureObserver,
    PublishOutcome,
};
pub use topology::Topology;
