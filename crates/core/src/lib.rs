//! # Postwright Core
//!
//! Domain types, traits, and error definitions for the Postwright mention
//! worker. This crate has **no transport dependencies**: it defines the
//! model that the provider, bus, and agent crates implement against.
//!
//! ## Collaborators
//!
//! The worker talks to exactly two external systems, each behind a trait:
//! - [`Provider`] — a text-generation backend (the "content generator")
//! - [`MessageBus`] — the multi-agent bus that delivers mentions and replies
//!
//! Both are acquired once at startup and shared as `Arc<dyn …>`, which keeps
//! the agent loop testable with scripted stand-ins.

pub mod bus;
pub mod error;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use bus::{Mention, MessageBus};
pub use error::{BusError, Error, FormatError, ProviderError, Result};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
