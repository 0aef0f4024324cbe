//! Wire contract for the "user registered" fact.
//!
//! The payload is a flat JSON object:
//!
//! ```json
//! {
//!   "user_id": "11111111-1111-1111-1111-111111111111",
//!   "email": "a@example.com",
//!   "username": "alice",
//!   "registered_at": "2024-01-01T00:00:00Z"
//! }
//! ```
//!
//! There is no version field. Producer and consumer must be deployed with
//! the same schema.

use chrono::Utc;
use filmnesia_core::types::{Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// MIME type stamped on every published message.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// A point-in-time snapshot of a newly created account.
///
/// Never mutated after construction; later profile edits do not flow back
/// into already-published events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRegisteredEvent {
    pub user_id: UserId,
    pub email: String,
    pub username: String,
    pub registered_at: Timestamp,
}

impl UserRegisteredEvent {
    /// Build the event for an account whose row was committed at
    /// `created_at`.
    ///
    /// `registered_at` is the publisher's clock, clamped so it never
    /// precedes the persisted creation time even if the database clock runs
    /// ahead of ours.
    pub fn for_account(
        user_id: UserId,
        email: impl Into<String>,
        username: impl Into<String>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            user_id,
            email: email.into(),
            username: username.into(),
            registered_at: Utc::now().max(created_at),
        }
    }

    /// Serialize to the JSON byte payload.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Parse a JSON byte payload. Any failure here marks the message as
    /// poison.
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Key used to suppress duplicate side effects under at-least-once
    /// delivery. One registration per account, so the account id suffices.
    pub fn idempotency_key(&self) -> UserId {
        self.user_id
    }
}
