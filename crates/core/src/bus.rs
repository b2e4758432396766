//! MessageBus trait — the abstraction over the multi-agent message bus.
//!
//! The bus delivers mentions addressed to this worker and carries replies
//! back into the originating thread. Connection setup, transport, and
//! authentication belong to the implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::BusError;

/// An inbound request addressed to this worker.
///
/// Created by the bus when a matching message arrives. Immutable; the worker
/// hands it by value to the response pipeline, which consumes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mention {
    /// Conversation the reply must be routed back to
    pub thread_id: String,

    /// The requesting party; the reply is addressed to them
    pub sender_id: String,

    /// Free-form request text
    #[serde(rename = "content")]
    pub body: String,
}

impl Mention {
    pub fn new(
        thread_id: impl Into<String>,
        sender_id: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            sender_id: sender_id.into(),
            body: body.into(),
        }
    }

    /// A short, single-line preview of the body for log fields.
    pub fn preview(&self, max_chars: usize) -> String {
        let flat = self.body.split_whitespace().collect::<Vec<_>>().join(" ");
        if flat.chars().count() <= max_chars {
            flat
        } else {
            let cut: String = flat.chars().take(max_chars).collect();
            format!("{cut}…")
        }
    }
}

/// The core MessageBus trait.
///
/// Both operations may suspend for a long time. The worker never calls them
/// concurrently.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Human-readable bus name (e.g., "coral").
    fn name(&self) -> &str;

    /// Block until a message addressed to this worker arrives.
    ///
    /// Implementations may poll internally; they only return once a mention
    /// is available or the transport fails.
    async fn wait_for_mention(&self) -> std::result::Result<Mention, BusError>;

    /// Deliver `content` into `thread_id`, addressed to `recipient_id`.
    async fn send_message(
        &self,
        thread_id: &str,
        recipient_id: &str,
        content: &str,
    ) -> std::result::Result<(), BusError>;

    /// Close the connection gracefully.
    async fn close(&self) -> std::result::Result<(), BusError> {
        Ok(()) // No-op default
    }
}
