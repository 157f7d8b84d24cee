//! Error types for the mathrpc server and client
//!
//! This module provides comprehensive error handling using thiserror for
//! structured error definitions and anyhow for error propagation.
//!
//! Domain failures of the arithmetic operations are NOT represented here; they
//! live in [`crate::math::MathError`] and are rendered into result values by the
//! dispatcher so they never cross the wire as protocol failures.

use thiserror::Error;

/// Main error type for mathrpc operations
#[derive(Error, Debug)]
pub enum MathRpcError {
    /// Request or response payload could not be understood
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Server unreachable or did not answer in time
    #[error("RPC server not found or inactive: {0}")]
    ServerNotFound(String),

    /// Remote solver service failed
    #[error("Remote service error: {0}")]
    RemoteService(String),

    /// Remote solver service does not know the requested model
    #[error("Remote model unavailable: {0}")]
    ModelUnavailable(String),

    /// Headline provider failed
    #[error("News provider error: {0}")]
    News(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Result type alias for mathrpc operations
pub type Result<T> = std::result::Result<T, MathRpcError>;

/// Convert anyhow::Error to MathRpcError
impl From<anyhow::Error> for MathRpcError {
    fn from(err: anyhow::Error) -> Self {
        MathRpcError::Other(err.to_string())
    }
}
