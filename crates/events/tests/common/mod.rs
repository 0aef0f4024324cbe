//! Shared helpers for the delivery-loop integration tests.
//!
//! [`FakeDelivery`] stands in for a broker delivery and records how it was
//! settled. [`delivery_stream`] gives a channel-backed stream the loop can
//! pull from while the test keeps pushing.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use filmnesia_events::{
    Backoff, BrokerError, EventHandler, HandlerError, InboundDelivery, RetryPolicy,
    UserRegisteredEvent,
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

/// How a delivery was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    Ack,
    Nack { requeue: bool },
}

/// Settlement log shared by every delivery of a test, in settle order.
pub type SettleLog = Arc<Mutex<Vec<(u64, Settled)>>>;

pub struct FakeDelivery {
    pub tag: u64,
    pub payload: Vec<u8>,
    pub redelivered: bool,
    log: SettleLog,
}

impl FakeDelivery {
    pub fn new(tag: u64, payload: impl Into<Vec<u8>>, log: &SettleLog) -> Self {
        Self {
            tag,
            payload: payload.into(),
            redelivered: false,
            log: log.clone(),
        }
    }

    pub fn as_redelivery(mut self) -> Self {
        self.redelivered = true;
        self
    }
}

#[async_trait]
impl InboundDelivery for FakeDelivery {
    fn payload(&self) -> &[u8] {
        &self.payload
    }

    fn delivery_tag(&self) -> u64 {
        self.tag
    }

    fn redelivered(&self) -> bool {
        self.redelivered
    }

    async fn ack(&self) -> Result<(), BrokerError> {
        self.log.lock().unwrap().push((self.tag, Settled::Ack));
        Ok(())
    }

    async fn nack(&self, requeue: bool) -> Result<(), BrokerError> {
        self.log
            .lock()
            .unwrap()
            .push((self.tag, Settled::Nack { requeue }));
        Ok(())
    }
}

pub fn settle_log() -> SettleLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn settled(log: &SettleLog) -> Vec<(u64, Settled)> {
    log.lock().unwrap().clone()
}

/// Sender half plus the stream the delivery loop consumes.
pub fn delivery_stream() -> (
    mpsc::Sender<Result<FakeDelivery, BrokerError>>,
    ReceiverStream<Result<FakeDelivery, BrokerError>>,
) {
    let (tx, rx) = mpsc::channel(16);
    (tx, ReceiverStream::new(rx))
}

pub fn event_json(user_id: Uuid) -> Vec<u8> {
    UserRegisteredEvent::for_account(user_id, "a@example.com", "alice", Utc::now())
        .encode()
        .unwrap()
}

/// Retry policy with short delays; tests run on a paused clock anyway.
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        backoff: Backoff::new(Duration::from_millis(10), Duration::from_millis(50)),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Records the user id of every event it sees, in call order.
#[derive(Default)]
pub struct Recording {
    pub seen: Mutex<Vec<Uuid>>,
}

impl Recording {
    pub fn seen(&self) -> Vec<Uuid> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventHandler for Recording {
    async fn handle(&self, event: &UserRegisteredEvent) -> Result<(), HandlerError> {
        self.seen.lock().unwrap().push(event.user_id);
        Ok(())
    }
}

/// Always fails with the given error and counts calls.
pub struct Failing {
    pub error: HandlerError,
    pub calls: AtomicUsize,
}

impl Failing {
    pub fn new(error: HandlerError) -> Self {
        Self {
            error,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventHandler for Failing {
    async fn handle(&self, _event: &UserRegisteredEvent) -> Result<(), HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

/// Signals when it starts and then blocks until released.
pub struct Gated {
    pub started: mpsc::Sender<Uuid>,
    pub release: tokio::sync::Semaphore,
}

#[async_trait]
impl EventHandler for Gated {
    async fn handle(&self, event: &UserRegisteredEvent) -> Result<(), HandlerError> {
        let _ = self.started.send(event.user_id).await;
        let permit = self
            .release
            .acquire()
            .await
            .map_err(|e| HandlerError::Permanent(e.to_string()))?;
        permit.forget();
        Ok(())
    }
}
