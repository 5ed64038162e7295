//! Error types for the universal store.

use thiserror::Error;

/// Main error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid store configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// A follower gave up waiting for a leader during the handshake.
    #[error("No leader available for store {store_key}")]
    LeaderUnavailable { store_key: String },
}

impl StoreError {
    /// Wrap a failure encoding a value for the wire.
    pub(crate) fn encode(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }

    /// Wrap a failure reading a value off the wire.
    pub(crate) fn decode(e: serde_json::Error) -> Self {
        StoreError::Deserialization(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
