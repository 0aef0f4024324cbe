//! Side-effect handlers invoked once per decoded delivery.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use filmnesia_core::types::UserId;
use tokio::sync::Mutex;

use crate::error::HandlerError;
use crate::event::UserRegisteredEvent;

/// The per-message side effect.
///
/// May be slow and may fail; the [`HandlerError`] variant tells the delivery
/// loop whether the message is worth retrying.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &UserRegisteredEvent) -> Result<(), HandlerError>;
}

#[async_trait]
impl<H: EventHandler + ?Sized> EventHandler for Arc<H> {
    async fn handle(&self, event: &UserRegisteredEvent) -> Result<(), HandlerError> {
        (**self).handle(event).await
    }
}

/// Logs the intent to send a welcome message. Never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct WelcomeLogger;

#[async_trait]
impl EventHandler for WelcomeLogger {
    async fn handle(&self, event: &UserRegisteredEvent) -> Result<(), HandlerError> {
        tracing::info!(
            user_id = %event.user_id,
            email = %event.email,
            username = %event.username,
            "Sending welcome notification"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Idempotent
// ---------------------------------------------------------------------------

/// Skips events whose idempotency key was already handled successfully.
///
/// At-least-once delivery can hand the same registration over twice (e.g.
/// redelivery after a connection drop that lost the ack). Only successes are
/// remembered, so a failed attempt is retried normally. The window is
/// bounded; the oldest keys are evicted first.
pub struct Idempotent<H> {
    inner: H,
    seen: Mutex<SeenWindow>,
}

impl<H: EventHandler> Idempotent<H> {
    pub fn new(inner: H, capacity: usize) -> Self {
        Self {
            inner,
            seen: Mutex::new(SeenWindow::new(capacity)),
        }
    }
}

#[async_trait]
impl<H: EventHandler> EventHandler for Idempotent<H> {
    async fn handle(&self, event: &UserRegisteredEvent) -> Result<(), HandlerError> {
        let key = event.idempotency_key();
        if self.seen.lock().await.contains(&key) {
            tracing::info!(user_id = %key, "Duplicate UserRegistered event skipped");
            return Ok(());
        }

        self.inner.handle(event).await?;
        self.seen.lock().await.insert(key);
        Ok(())
    }
}

/// Fixed-capacity FIFO set of recently seen keys.
struct SeenWindow {
    capacity: usize,
    order: VecDeque<UserId>,
    keys: HashSet<UserId>,
}

impl SeenWindow {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity.min(1024)),
            keys: HashSet::with_capacity(capacity.min(1024)),
        }
    }

    fn contains(&self, key: &UserId) -> bool {
        self.keys.contains(key)
    }

    fn insert(&mut self, key: UserId) {
        if self.capacity == 0 || !self.keys.insert(key) {
            return;
        }
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.keys.remove(&evicted);
            }
        }
    }
}
