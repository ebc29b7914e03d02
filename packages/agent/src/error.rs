//! Error types for the form agent.
//!
//! Only a handful of these ever reach a caller of the query pipeline: the
//! transport encodes ordinary provider failures as diagnostic text, so most
//! variants surface from a single backend attempt and are retried.

use thiserror::Error;

/// Main error type for the form agent library.
#[derive(Debug, Error)]
pub enum FormAgentError {
    /// Missing or invalid configuration. Fatal, never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// Caller supplied an invalid request.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// HTTP request to the LLM provider failed.
    #[error("LLM API request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered with a non-success status.
    #[error("LLM API error (status {status}): {message}")]
    ProviderStatus { status: u16, message: String },

    /// Provider body could not be decoded.
    #[error("failed to parse LLM response: {0}")]
    ResponseParse(String),

    /// Form id not present in the store.
    #[error("form not found: {0}")]
    FormNotFound(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FormAgentError {
    /// Whether this error must abort a call instead of being retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FormAgentError::Config(_))
    }
}

/// Result type alias for form agent operations.
pub type Result<T> = std::result::Result<T, FormAgentError>;
