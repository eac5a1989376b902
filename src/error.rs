//! Error types for the replicated store and its collaborators.
//!
//! The core store operations never fail. These errors are produced by the
//! surfaces that touch the outside world: wire payloads, transports and the
//! on-disk settings cache.

use thiserror::Error;

/// Main error type for fallible operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Settings are locked by another process")]
    Locked,

    #[error("Settings directory does not exist: {0}")]
    NotInitialized(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Session is closed")]
    SessionClosed,
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for SyncError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        SyncError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for SyncError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        SyncError::Deserialization(e.to_string())
    }
}

/// Result type for fallible operations.
pub type Result<T> = std::result::Result<T, SyncError>;
