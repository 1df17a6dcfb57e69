//! Error types for the context synchronization system.

use crate::store::StoreKind;
use thiserror::Error;

/// Bridge/transport errors
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Bridge to {0} is closed")]
    Closed(String),

    #[error("Failed to encode sync message: {0}")]
    Encode(String),

    #[error("Failed to decode sync message: {0}")]
    Decode(String),

    #[error("Bridge disconnected: {0}")]
    Disconnected(String),
}

/// Synchronization errors surfaced to callers
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("`{store}` cannot mutate option `{key}` because it is a read-only property.")]
    ReadOnlyViolation { store: StoreKind, key: String },

    #[error("No context bridge available for origin {0}")]
    BridgeUnavailable(String),

    #[error("A secondary context for origin {0} is already active")]
    ContextAlreadyActive(String),

    #[error("Entering context {origin} aborted: {reason}")]
    EntryAborted { origin: String, reason: String },

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<config::ConfigError> for SyncError {
    fn from(err: config::ConfigError) -> Self {
        SyncError::ConfigError(err.to_string())
    }
}

impl From<bincode::Error> for BridgeError {
    fn from(err: bincode::Error) -> Self {
        BridgeError::Encode(err.to_string())
    }
}
