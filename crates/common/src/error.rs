//! Common error types for vip-manager components.

use std::fmt;

/// A specialized Result type for vip-manager operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for vip-manager operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Coordination store error: {0}")]
    Store(String),

    #[error("Address error: {0}")]
    Address(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Unknown error: {0}")]
    Other(String),
}

impl Error {
    /// Create a new coordination store error.
    pub fn store(msg: impl fmt::Display) -> Self {
        Error::Store(msg.to_string())
    }

    /// Create a new address error.
    pub fn address(msg: impl fmt::Display) -> Self {
        Error::Address(msg.to_string())
    }

    /// Create a new configuration error.
    pub fn config(msg: impl fmt::Display) -> Self {
        Error::Config(msg.to_string())
    }

    /// Create a new other error.
    pub fn other(msg: impl fmt::Display) -> Self {
        Error::Other(msg.to_string())
    }

    /// Whether this error only reports cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
