//! Error types for coshard

use thiserror::Error;

/// Core error type for coshard operations
#[derive(Error, Debug)]
pub enum CoshardError {
    /// Dialing or authenticating against a backend failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// An acquire deadline expired while the pool was exhausted
    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Pool is closed")]
    PoolClosed,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl CoshardError {
    /// Whether the error means the backend could not be reached or handed out.
    ///
    /// The frontend reports these to clients as "backend unavailable".
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(
            self,
            CoshardError::Connection(_) | CoshardError::Timeout(_) | CoshardError::PoolClosed
        )
    }
}

/// Result type alias for coshard operations
pub type Result<T> = std::result::Result<T, CoshardError>;
