//! The response pipeline: one mention in, one validated reply out.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use postwright_config::GeneratorConfig;
use postwright_core::bus::{Mention, MessageBus};
use postwright_core::error::{Error, Result};
use postwright_core::provider::{Provider, ProviderRequest};
use tracing::{debug, info};

use crate::batch::ContentBatch;
use crate::instruction::{Instruction, Persona};

/// Anything the worker can hand a mention to.
#[async_trait]
pub trait MentionHandler: Send + Sync {
    /// Fully handle one mention. An error abandons the cycle.
    async fn handle(&self, mention: Mention) -> Result<()>;
}

/// Generates a five-post batch for a mention and replies in its thread.
pub struct ResponsePipeline {
    /// The content generator
    provider: Arc<dyn Provider>,

    /// Where replies go
    bus: Arc<dyn MessageBus>,

    /// Persona framing every instruction
    persona: Persona,

    /// The model to request
    model: String,

    /// Sampling temperature
    temperature: f32,

    /// Response token cap
    max_tokens: Option<u32>,
}

impl ResponsePipeline {
    pub fn new(
        provider: Arc<dyn Provider>,
        bus: Arc<dyn MessageBus>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            bus,
            persona: Persona::default(),
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
        }
    }

    /// Create a pipeline using the generator settings from config.
    pub fn from_config(
        provider: Arc<dyn Provider>,
        bus: Arc<dyn MessageBus>,
        config: &GeneratorConfig,
    ) -> Self {
        Self::new(provider, bus, &config.model)
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Ask the generator for posts and validate them against the contract.
    ///
    /// Nothing is sent; a malformed answer is a `Format` error.
    pub async fn generate(&self, request: &str) -> Result<ContentBatch> {
        let instruction = Instruction::build(&self.persona, request);
        let provider_request = ProviderRequest {
            model: self.model.clone(),
            messages: instruction.to_messages(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let started = Instant::now();
        let response = self.provider.complete(provider_request).await?;
        debug!(
            provider = self.provider.name(),
            model = %response.model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            total_tokens = response.usage.as_ref().map(|u| u.total_tokens),
            "Generation finished"
        );

        let batch = ContentBatch::parse(&response.message.content)?;
        Ok(batch)
    }
}

#[async_trait]
impl MentionHandler for ResponsePipeline {
    async fn handle(&self, mention: Mention) -> Result<()> {
        if mention.body.trim().is_empty() {
            return Err(Error::InvalidMention(format!(
                "empty request from {} in thread {}",
                mention.sender_id, mention.thread_id
            )));
        }

        info!(
            thread_id = %mention.thread_id,
            sender_id = %mention.sender_id,
            request = %mention.preview(80),
            "Generating posts"
        );

        let batch = self.generate(&mention.body).await?;
        let reply = batch.format();

        self.bus
            .send_message(&mention.thread_id, &mention.sender_id, &reply)
            .await?;

        info!(
            thread_id = %mention.thread_id,
            sender_id = %mention.sender_id,
            posts = batch.items().len(),
            "Reply sent"
        );
        Ok(())
    }
}
