//! Error types for PipeKV
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using KvsError
pub type Result<T> = std::result::Result<T, KvsError>;

/// Unified error type for PipeKV operations
#[derive(Debug, Error)]
pub enum KvsError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Validation Errors
    // -------------------------------------------------------------------------
    #[error("Invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    #[error("Invalid value for key {key:?}: {reason}")]
    InvalidValue { key: String, reason: &'static str },

    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    // -------------------------------------------------------------------------
    // Capacity Errors
    // -------------------------------------------------------------------------
    #[error("Subscriber limit reached for key {0:?}")]
    SubscriberLimit(String),

    #[error("Backup capacity of {limit} concurrent snapshots reached")]
    BackupCapacity { limit: usize },

    // -------------------------------------------------------------------------
    // Channel Errors
    // -------------------------------------------------------------------------
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Initialization Errors
    // -------------------------------------------------------------------------
    #[error("Initialization failed: {0}")]
    Init(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl KvsError {
    /// True for errors caused by the peer going away rather than by us
    pub fn is_disconnect(&self) -> bool {
        match self {
            KvsError::ChannelClosed(_) => true,
            KvsError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::NotConnected
            ),
            _ => false,
        }
    }
}
