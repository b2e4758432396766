//! Decoding of Coral tool results.
//!
//! `wait_for_mentions` answers with a text block. When mentions arrived it
//! contains a JSON document, sometimes after a short human-readable prefix;
//! when the poll timed out it is plain prose ("No new messages ..."). Both
//! shapes are accepted here so the adapter never treats an idle poll as an
//! error.

use postwright_core::bus::Mention;
use postwright_core::error::BusError;
use serde::Deserialize;
use tracing::{debug, warn};

/// One message as the bus reports it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BusMessage {
    #[serde(default)]
    thread_id: Option<String>,
    #[serde(default)]
    sender_id: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MentionsPayload {
    Wrapped { messages: Vec<BusMessage> },
    List(Vec<BusMessage>),
    Single(BusMessage),
}

/// Extract every well-formed mention from a `wait_for_mentions` text result.
///
/// Messages sent by `own_id` are dropped so the worker never answers itself.
/// Messages missing a thread, sender, or content are skipped with a warning.
pub fn decode_mentions(text: &str, own_id: &str) -> Vec<Mention> {
    let Some(start) = text.find(['{', '[']) else {
        debug!(reply = %text.trim(), "No mentions in bus reply");
        return Vec::new();
    };

    // Only the first JSON value counts; anything trailing it is prose.
    let first = serde_json::Deserializer::from_str(&text[start..])
        .into_iter::<MentionsPayload>()
        .next();
    let payload = match first {
        Some(Ok(p)) => p,
        Some(Err(e)) => {
            warn!(error = %e, "Unparseable mentions payload, ignoring");
            return Vec::new();
        }
        None => return Vec::new(),
    };

    let messages = match payload {
        MentionsPayload::Wrapped { messages } => messages,
        MentionsPayload::List(list) => list,
        MentionsPayload::Single(msg) => vec![msg],
    };

    messages
        .into_iter()
        .filter_map(|msg| match (msg.thread_id, msg.sender_id, msg.content) {
            (Some(thread_id), Some(sender_id), Some(content)) => {
                if sender_id == own_id {
                    debug!(thread_id = %thread_id, "Skipping own message");
                    None
                } else {
                    Some(Mention::new(thread_id, sender_id, content))
                }
            }
            _ => {
                warn!("Skipping bus message without threadId/senderId/content");
                None
            }
        })
        .collect()
}

/// Concatenate the text parts of a serialized `CallToolResult`.
///
/// Fails when the bus flagged the call as an error.
pub fn tool_result_text(tool: &str, result: &serde_json::Value) -> Result<String, BusError> {
    let text = result["content"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part["text"].as_str())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();

    if result["isError"].as_bool().unwrap_or(false) {
        return Err(BusError::ToolFailed {
            tool: tool.to_string(),
            reason: if text.is_empty() { "tool reported an error".into() } else { text },
        });
    }

    Ok(text)
}
