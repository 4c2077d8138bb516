//! # Multi-agent Message envelope and Protocol validation
//!
//! The wire format agents use to talk to each other through
//! [`crate::collaboration::CollaborationManager`]'s routing side-channel.
//! Separate from [`crate::types::Message`], which is the single-agent
//! model-conversation message.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

fn default_message_type() -> String {
    "message".to_string()
}

/// An inter-agent message. `id` is unique, `timestamp` strictly increases per
/// process (even across messages stamped with the same wall-clock millis),
/// `from`/`to` are non-empty (`"broadcast"` is the only sentinel recipient).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique id for this message.
    pub id: String,
    /// Sending agent's id.
    pub from: String,
    /// Receiving agent's id, or `"broadcast"`.
    pub to: String,
    /// Arbitrary JSON payload.
    pub content: Value,
    /// Message type, consulted by [`Protocol::accepts`]. Defaults to `"message"`.
    #[serde(rename = "type", default = "default_message_type")]
    pub message_type: String,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    /// Monotonic send timestamp, in milliseconds.
    pub timestamp: i64,
}

static LAST_TIMESTAMP_MS: AtomicI64 = AtomicI64::new(0);

/// Returns a timestamp that is always greater than every timestamp this
/// function has previously returned in this process, even when called
/// repeatedly with the same `now_ms`.
fn monotonic_timestamp(now_ms: i64) -> i64 {
    let mut last = LAST_TIMESTAMP_MS.load(Ordering::SeqCst);
    loop {
        let next = now_ms.max(last + 1);
        match LAST_TIMESTAMP_MS.compare_exchange_weak(last, next, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

impl Message {
    /// Build a new `"message"`-typed envelope, validating `from`/`to`.
    pub fn new(from: impl Into<String>, to: impl Into<String>, content: Value, now_ms: i64) -> Result<Self> {
        Self::with_type(from, to, content, default_message_type(), now_ms)
    }

    /// Build a new envelope with an explicit message type.
    pub fn with_type(
        from: impl Into<String>,
        to: impl Into<String>,
        content: Value,
        message_type: impl Into<String>,
        now_ms: i64,
    ) -> Result<Self> {
        let from = from.into();
        let to = to.into();
        if from.is_empty() {
            return Err(Error::validation("message 'from' must not be empty"));
        }
        if to.is_empty() {
            return Err(Error::validation("message 'to' must not be empty"));
        }
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            from,
            to,
            content,
            message_type: message_type.into(),
            metadata: HashMap::new(),
            timestamp: monotonic_timestamp(now_ms),
        })
    }

    /// Whether this message is addressed to every recipient.
    pub fn is_broadcast(&self) -> bool {
        self.to == "broadcast"
    }
}

// ============================================================================
// PROTOCOL
// ============================================================================

/// A named interaction protocol, used to validate a [`Message`] before it's
/// routed. Any name outside the four built-ins accepts every message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Protocol {
    /// `type ∈ {"request", "response"}`.
    RequestResponse,
    /// `to == "broadcast"`.
    Broadcast,
    /// `type ∈ {"cfp", "proposal", "award", "reject"}`.
    ContractNet,
    /// `type ∈ {"bid", "accept", "reject"}`.
    Auction,
    /// Any other protocol name: accepts everything.
    Other(String),
}

impl Protocol {
    /// Resolve a protocol by its conventional name.
    pub fn named(name: impl AsRef<str>) -> Self {
        match name.as_ref() {
            "request-response" => Protocol::RequestResponse,
            "broadcast" => Protocol::Broadcast,
            "contract-net" => Protocol::ContractNet,
            "auction" => Protocol::Auction,
            other => Protocol::Other(other.to_string()),
        }
    }

    /// Whether `message` satisfies this protocol's rule.
    pub fn accepts(&self, message: &Message) -> bool {
        match self {
            Protocol::RequestResponse => {
                matches!(message.message_type.as_str(), "request" | "response")
            }
            Protocol::Broadcast => message.is_broadcast(),
            Protocol::ContractNet => {
                matches!(message.message_type.as_str(), "cfp" | "proposal" | "award" | "reject")
            }
            Protocol::Auction => matches!(message.message_type.as_str(), "bid" | "accept" | "reject"),
            Protocol::Other(_) => true,
        }
    }
}
