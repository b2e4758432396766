//! Content generator backends for Postwright.
//!
//! All backends implement the `postwright_core::Provider` trait. The worker
//! ships a single one: an OpenAI-compatible chat-completions client, which
//! covers Nebius AI Studio, OpenAI, OpenRouter, vLLM and Ollama.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
