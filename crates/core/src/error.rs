//! Error types for the Postwright domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for one response cycle.
///
/// Every variant is recoverable at the worker boundary: the cycle is
/// abandoned and the worker backs off before waiting again.
#[derive(Debug, Error)]
pub enum Error {
    // --- Content generator ---
    #[error("Generation error: {0}")]
    Generation(#[from] ProviderError),

    // --- Output contract ---
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    // --- Message bus ---
    #[error("Delivery error: {0}")]
    Delivery(#[from] BusError),

    // --- Inbound request ---
    #[error("Invalid mention: {0}")]
    InvalidMention(String),
}

impl Error {
    /// Short stable label for the error kind, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Generation(_) => "generation",
            Error::Format(_) => "format",
            Error::Delivery(_) => "delivery",
            Error::InvalidMention(_) => "invalid_mention",
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Empty completion from {0}")]
    EmptyResponse(String),
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("Bus not configured: {0}")]
    NotConfigured(String),

    #[error("Failed to connect to bus at {endpoint}: {reason}")]
    ConnectFailed { endpoint: String, reason: String },

    #[error("Message delivery failed to thread {thread_id}: {reason}")]
    DeliveryFailed { thread_id: String, reason: String },

    #[error("Bus connection lost: {0}")]
    ConnectionLost(String),

    #[error("Tool '{tool}' failed: {reason}")]
    ToolFailed { tool: String, reason: String },

    #[error("Invalid bus payload: {0}")]
    InvalidPayload(String),
}

/// Violations of the five-post reply contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("expected {expected} posts, found {found}")]
    WrongPostCount { expected: usize, found: usize },

    #[error("post header out of order: expected Post {expected}, found Post {found}")]
    OutOfOrder { expected: usize, found: usize },

    #[error("post {index} is missing its {field} line")]
    MissingField { index: usize, field: &'static str },

    #[error("post {index} has more than one {field} line")]
    DuplicateField { index: usize, field: &'static str },

    #[error("post {index} has an empty {field}")]
    EmptyField { index: usize, field: &'static str },

    #[error("post {index} keyword '{token}' does not start with '#'")]
    InvalidKeyword { index: usize, token: String },

    #[error("post {index} has unexpected text: {line}")]
    UnexpectedLine { index: usize, line: String },

    #[error("no 'Post 1:' header found in generated text")]
    NoPosts,
}
