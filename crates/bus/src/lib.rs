//! Message bus adapters for Postwright.
//!
//! Each adapter implements `postwright_core::MessageBus`:
//! - **Coral** — MCP-over-SSE bus used by Coral multi-agent sessions
//!
//! [`payload`] holds the decoding of bus tool results, kept separate from the
//! transport so it can be exercised without a live server.

pub mod coral;
pub mod payload;

pub use coral::{CoralBus, McpSession, ToolSession};
