//! Configuration loading and validation for Postwright.
//!
//! All settings come from the process environment. When the worker is not
//! launched by an orchestration runtime (`CORAL_ORCHESTRATION_RUNTIME` unset),
//! a local `.env` file is loaded first and overrides inherited values.

use std::collections::HashMap;
use std::time::Duration;

use url::Url;

pub const DEFAULT_AGENT_DESCRIPTION: &str =
    "An AI agent that generates Reddit posts about AI and ML topics with fine-tuned knowledge";
pub const DEFAULT_API_URL: &str = "https://api.studio.nebius.com/v1/";
pub const DEFAULT_MODEL: &str = "meta-llama/Llama-3.3-70B-Instruct-fast-LoRa:reddit-posts-HXTo";

/// The root configuration structure.
#[derive(Clone)]
pub struct WorkerConfig {
    /// Message bus connection
    pub bus: BusConfig,

    /// Content generator backend
    pub generator: GeneratorConfig,

    /// Event loop pacing
    pub worker: LoopConfig,
}

/// Connection parameters for the Coral message bus.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// SSE endpoint of the bus (without agent query parameters)
    pub sse_url: String,

    /// This worker's identity on the bus
    pub agent_id: String,

    /// Description advertised to other agents
    pub agent_description: String,

    /// Per-poll timeout handed to `wait_for_mentions`
    pub wait_timeout_ms: u64,
}

#[derive(Clone)]
pub struct GeneratorConfig {
    /// OpenAI-compatible base URL
    pub api_url: String,

    /// Backend credential
    pub api_key: String,

    /// Model identifier
    pub model: String,

    pub temperature: f32,

    pub max_tokens: u32,

    /// HTTP request timeout
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Fixed delay after a failed cycle
    pub backoff_secs: u64,

    /// Pause after a successful cycle
    pub cycle_delay_secs: u64,

    /// Stop after this many consecutive failed cycles. `None` runs forever.
    pub max_consecutive_failures: Option<u32>,
}

fn default_wait_timeout_ms() -> u64 {
    30_000
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_request_timeout_secs() -> u64 {
    120
}
fn default_backoff_secs() -> u64 {
    5
}
fn default_cycle_delay_secs() -> u64 {
    1
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            backoff_secs: default_backoff_secs(),
            cycle_delay_secs: default_cycle_delay_secs(),
            max_consecutive_failures: None,
        }
    }
}

impl LoopConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }

    pub fn cycle_delay(&self) -> Duration {
        Duration::from_secs(self.cycle_delay_secs)
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &str) -> &'static str {
    if s.is_empty() { "None" } else { "[REDACTED]" }
}

impl std::fmt::Debug for WorkerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerConfig")
            .field("bus", &self.bus)
            .field("generator", &self.generator)
            .field("worker", &self.worker)
            .finish()
    }
}

impl std::fmt::Debug for GeneratorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl BusConfig {
    /// The SSE URL with the agent identity encoded as query parameters.
    pub fn connection_url(&self) -> Result<Url, ConfigError> {
        let mut url = Url::parse(&self.sse_url).map_err(|e| ConfigError::InvalidValue {
            key: "CORAL_SSE_URL",
            reason: e.to_string(),
        })?;
        url.query_pairs_mut()
            .append_pair("agentId", &self.agent_id)
            .append_pair("agentDescription", &self.agent_description);
        Ok(url)
    }
}

impl WorkerConfig {
    /// Load configuration from the process environment.
    ///
    /// Loads `.env` from the working directory first unless
    /// `CORAL_ORCHESTRATION_RUNTIME` is set.
    pub fn load() -> Result<Self, ConfigError> {
        if std::env::var("CORAL_ORCHESTRATION_RUNTIME").is_err() {
            match dotenvy::dotenv_override() {
                Ok(path) => tracing::info!(path = %path.display(), "Loaded environment file"),
                Err(e) if e.not_found() => {
                    tracing::debug!("No .env file found, using process environment")
                }
                Err(e) => {
                    return Err(ConfigError::EnvFile(e.to_string()));
                }
            }
        }

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an explicit set of variables.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    /// Build a configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::MissingVar(key));

        let bus = BusConfig {
            sse_url: required("CORAL_SSE_URL")?,
            agent_id: required("CORAL_AGENT_ID")?,
            agent_description: get("CORAL_AGENT_DESCRIPTION")
                .unwrap_or_else(|| DEFAULT_AGENT_DESCRIPTION.into()),
            wait_timeout_ms: parse_or("POSTWRIGHT_WAIT_TIMEOUT_MS", get("POSTWRIGHT_WAIT_TIMEOUT_MS"), default_wait_timeout_ms)?,
        };

        let generator = GeneratorConfig {
            api_url: get("POSTWRIGHT_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into()),
            api_key: required("NEBIUS_API_KEY")?,
            model: get("FINE_TUNED_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into()),
            temperature: parse_or("POSTWRIGHT_TEMPERATURE", get("POSTWRIGHT_TEMPERATURE"), default_temperature)?,
            max_tokens: parse_or("POSTWRIGHT_MAX_TOKENS", get("POSTWRIGHT_MAX_TOKENS"), default_max_tokens)?,
            request_timeout_secs: parse_or(
                "POSTWRIGHT_REQUEST_TIMEOUT_SECS",
                get("POSTWRIGHT_REQUEST_TIMEOUT_SECS"),
                default_request_timeout_secs,
            )?,
        };

        let worker = LoopConfig {
            backoff_secs: parse_or("POSTWRIGHT_BACKOFF_SECS", get("POSTWRIGHT_BACKOFF_SECS"), default_backoff_secs)?,
            cycle_delay_secs: parse_or(
                "POSTWRIGHT_CYCLE_DELAY_SECS",
                get("POSTWRIGHT_CYCLE_DELAY_SECS"),
                default_cycle_delay_secs,
            )?,
            max_consecutive_failures: get("POSTWRIGHT_MAX_FAILURES")
                .map(|raw| parse_value("POSTWRIGHT_MAX_FAILURES", &raw))
                .transpose()?,
        };

        let config = Self { bus, generator, worker };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        self.bus.connection_url()?;

        if !(0.0..=2.0).contains(&self.generator.temperature) {
            return Err(ConfigError::ValidationError(
                "POSTWRIGHT_TEMPERATURE must be between 0.0 and 2.0".into(),
            ));
        }

        if self.generator.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "POSTWRIGHT_MAX_TOKENS must be > 0".into(),
            ));
        }

        if self.worker.max_consecutive_failures == Some(0) {
            return Err(ConfigError::ValidationError(
                "POSTWRIGHT_MAX_FAILURES must be > 0 when set".into(),
            ));
        }

        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key,
        reason: e.to_string(),
    })
}

fn parse_or<T: std::str::FromStr>(
    key: &'static str,
    raw: Option<String>,
    default: fn() -> T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default()),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("Failed to load .env file: {0}")]
    EnvFile(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
