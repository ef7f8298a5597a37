//! Error types for Memori

use thiserror::Error;

use crate::memory::Backend;

/// Result type alias using Memori's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Memori
#[derive(Error, Debug)]
pub enum Error {
    /// Engine used before `enable()`
    #[error("Memory engine is not enabled")]
    NotEnabled,

    /// No provider in the fallback chain produced a vector
    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// A single provider call failed
    #[error("{backend} provider error: {message}")]
    ProviderTransport { backend: Backend, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build a provider error for `backend`
    pub fn provider(backend: Backend, message: impl Into<String>) -> Self {
        Error::ProviderTransport {
            backend,
            message: message.into(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_request()
                    || e.status().is_some_and(|s| s.is_server_error() || s.as_u16() == 429)
            }
            Error::Io(_) => true,
            _ => false,
        }
    }
}
