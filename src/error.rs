//! Error types for Keygate.

use thiserror::Error;

/// Main error type for Keygate operations.
#[derive(Error, Debug)]
pub enum KeygateError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The shared store could not execute an operation
    #[error("Store error: {0}")]
    Store(String),

    /// Redis errors
    #[cfg(feature = "redis-store")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl KeygateError {
    /// Whether this error comes from the shared store rather than from
    /// configuration.
    pub fn is_store_fault(&self) -> bool {
        match self {
            KeygateError::Store(_) => true,
            #[cfg(feature = "redis-store")]
            KeygateError::Redis(_) => true,
            _ => false,
        }
    }
}

/// Result type alias for Keygate operations.
pub type Result<T> = std::result::Result<T, KeygateError>;
