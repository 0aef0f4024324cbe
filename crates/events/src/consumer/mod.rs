//! Consume side of the pipeline.
//!
//! [`DeliveryLoop`] is the per-message state machine (decode, handle,
//! settle). [`NotificationConsumer`] owns the broker connection around it
//! and reconnects when the broker drops the channel.

mod inbound;
mod supervisor;

pub use inbound::InboundDelivery;
pub use supervisor::{ConsumerState, NotificationConsumer};

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::backoff::RetryPolicy;
use crate::error::{BrokerError, HandlerError};
use crate::event::UserRegisteredEvent;
use crate::handler::EventHandler;

// ---------------------------------------------------------------------------
// Disposition
// ---------------------------------------------------------------------------

/// How a processed delivery is settled with the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Handled; remove from the queue.
    Ack,
    /// Transient failure; put back on the queue for another attempt.
    Requeue,
    /// Poison or permanent failure; drop (or dead-letter).
    Reject,
}

impl Disposition {
    /// Map a handler outcome to a disposition.
    ///
    /// An exhausted transient failure is requeued only if `redelivered` is
    /// false, so a persistently failing side effect cannot loop forever.
    /// The broker sets `redelivered` on every redelivery, including those
    /// after a consumer crash or a dropped connection, not only after our
    /// own requeue. Such a message gets its in-process retries but no
    /// broker requeue. An [`Interrupted`](HandlerOutcome::Interrupted)
    /// outcome always requeues: the retry budget was not spent.
    pub fn for_outcome(outcome: &HandlerOutcome, redelivered: bool) -> Self {
        match outcome {
            HandlerOutcome::Interrupted(_) => Disposition::Requeue,
            HandlerOutcome::Finished(Ok(())) => Disposition::Ack,
            HandlerOutcome::Finished(Err(HandlerError::Permanent(_))) => Disposition::Reject,
            HandlerOutcome::Finished(Err(HandlerError::Transient(_))) if redelivered => {
                Disposition::Reject
            }
            HandlerOutcome::Finished(Err(HandlerError::Transient(_))) => Disposition::Requeue,
        }
    }
}

/// Result of running the handler under the retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// The handler succeeded, failed permanently, or used up its attempts.
    Finished(Result<(), HandlerError>),
    /// Cancellation arrived during a retry backoff. Carries the last
    /// transient error.
    Interrupted(HandlerError),
}

impl HandlerOutcome {
    fn error(&self) -> Option<&HandlerError> {
        match self {
            HandlerOutcome::Finished(Ok(())) => None,
            HandlerOutcome::Finished(Err(e)) | HandlerOutcome::Interrupted(e) => Some(e),
        }
    }
}

/// Why [`DeliveryLoop::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The cancellation token fired.
    Cancelled,
    /// The broker closed the delivery stream.
    StreamClosed,
}

// ---------------------------------------------------------------------------
// DeliveryLoop
// ---------------------------------------------------------------------------

/// Processes deliveries strictly one at a time, in stream order.
pub struct DeliveryLoop {
    handler: Arc<dyn EventHandler>,
    retry: RetryPolicy,
}

impl DeliveryLoop {
    pub fn new(handler: Arc<dyn EventHandler>, retry: RetryPolicy) -> Self {
        Self { handler, retry }
    }

    /// Pull deliveries until cancellation or until the stream ends.
    ///
    /// Cancellation is checked before every pull, so once `cancel` fires no
    /// further delivery is taken. A delivery already being processed runs
    /// to completion and is settled before this returns. Failure to settle
    /// a delivery means the channel is gone and is returned as an error.
    pub async fn run<S, D>(
        &self,
        deliveries: S,
        cancel: &CancellationToken,
    ) -> Result<LoopExit, BrokerError>
    where
        S: Stream<Item = Result<D, BrokerError>> + Send,
        D: InboundDelivery,
    {
        tokio::pin!(deliveries);

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("Consumer cancelled, no longer accepting deliveries");
                    return Ok(LoopExit::Cancelled);
                }
                next = deliveries.next() => next,
            };

            match next {
                Some(Ok(delivery)) => {
                    self.process(&delivery, cancel).await?;
                }
                Some(Err(e)) => {
                    tracing::error!(error = %e, "Delivery stream failed");
                    return Err(e);
                }
                None => {
                    tracing::warn!("Delivery stream closed by broker");
                    return Ok(LoopExit::StreamClosed);
                }
            }
        }
    }

    /// Decode, handle and settle one delivery.
    pub async fn process<D: InboundDelivery>(
        &self,
        delivery: &D,
        cancel: &CancellationToken,
    ) -> Result<Disposition, BrokerError> {
        let tag = delivery.delivery_tag();

        let event = match UserRegisteredEvent::decode(delivery.payload()) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(
                    delivery_tag = tag,
                    error = %e,
                    body = %String::from_utf8_lossy(delivery.payload()),
                    "Rejecting undecodable message"
                );
                delivery.nack(false).await?;
                return Ok(Disposition::Reject);
            }
        };

        tracing::debug!(delivery_tag = tag, user_id = %event.user_id, "Processing UserRegistered event");

        let outcome = self.handle_with_retry(&event, cancel).await;
        let disposition = Disposition::for_outcome(&outcome, delivery.redelivered());

        match disposition {
            Disposition::Ack => delivery.ack().await?,
            Disposition::Requeue => delivery.nack(true).await?,
            Disposition::Reject => delivery.nack(false).await?,
        }

        match outcome.error() {
            None => {
                tracing::info!(delivery_tag = tag, user_id = %event.user_id, "Message acknowledged")
            }
            Some(e) => tracing::warn!(
                delivery_tag = tag,
                user_id = %event.user_id,
                error = %e,
                ?disposition,
                redelivered = delivery.redelivered(),
                interrupted = matches!(outcome, HandlerOutcome::Interrupted(_)),
                "Handler failed"
            ),
        }

        Ok(disposition)
    }

    /// Invoke the handler, retrying transient failures with backoff.
    ///
    /// A cancellation that arrives during a backoff ends the retries with
    /// [`HandlerOutcome::Interrupted`].
    async fn handle_with_retry(
        &self,
        event: &UserRegisteredEvent,
        cancel: &CancellationToken,
    ) -> HandlerOutcome {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = self.handler.handle(event).await;

            let reason = match result {
                Err(HandlerError::Transient(reason)) if attempt < self.retry.max_attempts => {
                    reason
                }
                other => return HandlerOutcome::Finished(other),
            };

            let delay = self.retry.backoff.delay(attempt - 1);
            tracing::debug!(
                user_id = %event.user_id,
                attempt,
                max_attempts = self.retry.max_attempts,
                ?delay,
                reason = %reason,
                "Transient handler failure, retrying"
            );
            tokio::select! {
                _ = cancel.cancelled() => {
                    return HandlerOutcome::Interrupted(HandlerError::Transient(reason));
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
