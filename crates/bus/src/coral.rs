//! Coral bus adapter.
//!
//! Coral exposes the bus to agents as an MCP server reached over SSE. The
//! adapter connects once at startup, then drives two of the server's tools:
//! - `wait_for_mentions` — long-polls for messages addressed to this agent
//! - `send_message` — posts into a thread, mentioning the recipient
//!
//! A single poll can return several mentions. Extras are queued and handed
//! out one at a time, in arrival order, before the bus is polled again.

use std::collections::VecDeque;

use async_trait::async_trait;
use postwright_config::BusConfig;
use postwright_core::bus::{Mention, MessageBus};
use postwright_core::error::BusError;
use rmcp::model::CallToolRequestParam;
use rmcp::service::{RoleClient, RunningService, ServiceExt};
use rmcp::transport::SseClientTransport;
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::payload::{decode_mentions, tool_result_text};

pub const WAIT_FOR_MENTIONS: &str = "wait_for_mentions";
pub const SEND_MESSAGE: &str = "send_message";

/// A connected session able to invoke bus tools.
///
/// Returns the tool result serialized as JSON (`content` / `isError`).
#[async_trait]
pub trait ToolSession: Send + Sync {
    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<Value, BusError>;

    async fn close(&self) -> Result<(), BusError> {
        Ok(())
    }
}

/// MCP-over-SSE session backed by `rmcp`.
pub struct McpSession {
    endpoint: String,
    client: Mutex<Option<RunningService<RoleClient, ()>>>,
}

impl McpSession {
    /// Open the SSE transport and complete the MCP handshake.
    pub async fn connect(endpoint: &str) -> Result<Self, BusError> {
        let transport = SseClientTransport::start(endpoint.to_string())
            .await
            .map_err(|e| BusError::ConnectFailed {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        let client = ().serve(transport).await.map_err(|e| BusError::ConnectFailed {
            endpoint: endpoint.to_string(),
            reason: format!("MCP handshake failed: {e}"),
        })?;

        info!(server = ?client.peer_info(), "Connected to bus");

        Ok(Self {
            endpoint: endpoint.to_string(),
            client: Mutex::new(Some(client)),
        })
    }
}

#[async_trait]
impl ToolSession for McpSession {
    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<Value, BusError> {
        let guard = self.client.lock().await;
        let client = guard
            .as_ref()
            .ok_or_else(|| BusError::ConnectionLost(format!("session to {} closed", self.endpoint)))?;

        let result = client
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments: Some(arguments),
            })
            .await
            .map_err(|e| BusError::ToolFailed {
                tool: name.to_string(),
                reason: e.to_string(),
            })?;

        serde_json::to_value(&result).map_err(|e| BusError::InvalidPayload(e.to_string()))
    }

    async fn close(&self) -> Result<(), BusError> {
        if let Some(client) = self.client.lock().await.take() {
            client
                .cancel()
                .await
                .map_err(|e| BusError::ConnectionLost(e.to_string()))?;
        }
        Ok(())
    }
}

/// The Coral message bus adapter.
pub struct CoralBus {
    agent_id: String,
    wait_timeout_ms: u64,
    session: Box<dyn ToolSession>,
    pending: Mutex<VecDeque<Mention>>,
}

impl CoralBus {
    /// Connect to the bus described by `config`.
    pub async fn connect(config: &BusConfig) -> Result<Self, BusError> {
        let url = config
            .connection_url()
            .map_err(|e| BusError::NotConfigured(e.to_string()))?;
        info!(url = %url, agent_id = %config.agent_id, "Connecting to Coral bus");

        let session = McpSession::connect(url.as_str()).await?;
        Ok(Self::with_session(&config.agent_id, config.wait_timeout_ms, Box::new(session)))
    }

    /// Build an adapter over an already-connected session.
    pub fn with_session(
        agent_id: impl Into<String>,
        wait_timeout_ms: u64,
        session: Box<dyn ToolSession>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            wait_timeout_ms,
            session,
            pending: Mutex::new(VecDeque::new()),
        }
    }

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

#[async_trait]
impl MessageBus for CoralBus {
    fn name(&self) -> &str {
        "coral"
    }

    async fn wait_for_mention(&self) -> Result<Mention, BusError> {
        let mut pending = self.pending.lock().await;
        loop {
            if let Some(mention) = pending.pop_front() {
                return Ok(mention);
            }

            let result = self
                .session
                .call_tool(
                    WAIT_FOR_MENTIONS,
                    Self::args(json!({ "timeoutMs": self.wait_timeout_ms })),
                )
                .await?;
            let text = tool_result_text(WAIT_FOR_MENTIONS, &result)?;

            let mentions = decode_mentions(&text, &self.agent_id);
            if mentions.is_empty() {
                debug!("Poll returned no mentions, waiting again");
                continue;
            }
            if mentions.len() > 1 {
                debug!(count = mentions.len(), "Queued multiple mentions from one poll");
            }
            pending.extend(mentions);
        }
    }

    async fn send_message(
        &self,
        thread_id: &str,
        recipient_id: &str,
        content: &str,
    ) -> Result<(), BusError> {
        let result = self
            .session
            .call_tool(
                SEND_MESSAGE,
                Self::args(json!({
                    "threadId": thread_id,
                    "content": content,
                    "mentions": [recipient_id],
                })),
            )
            .await
            .map_err(|e| BusError::DeliveryFailed {
                thread_id: thread_id.to_string(),
                reason: e.to_string(),
            })?;

        tool_result_text(SEND_MESSAGE, &result).map_err(|e| BusError::DeliveryFailed {
            thread_id: thread_id.to_string(),
            reason: e.to_string(),
        })?;

        debug!(thread_id, recipient_id, bytes = content.len(), "Reply delivered");
        Ok(())
    }

    async fn close(&self) -> Result<(), BusError> {
        let dropped = self.pending.lock().await.len();
        if dropped > 0 {
            warn!(dropped, "Closing bus with unprocessed mentions");
        }
        self.session.close().await
    }
}
