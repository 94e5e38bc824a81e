//! Error types for Metriq

use thiserror::Error;

/// Result type alias using Metriq's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Metriq operations
#[derive(Error, Debug)]
pub enum Error {
    /// Grammar or semantic error in a query, surfaced verbatim to the caller
    #[error("{0}")]
    Parse(String),

    /// A data-structure invariant was broken (e.g. bucket collision)
    #[error("Invariant violated: {0}")]
    Invariant(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Metric store or metadata failure
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Channel send/receive error
    #[error("Channel error: {0}")]
    Channel(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create an invariant error
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for errors caused by the query text rather than the data or the engine
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(_))
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
