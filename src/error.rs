// Error types module

use std::fmt;

/// Top-level error for the service
///
/// Startup and wiring failures, categorized so the binary can report them
/// with a distinct exit code.
#[derive(Debug, Clone)]
pub enum ProxyError {
    /// Configuration errors (invalid YAML, missing env vars, bad patterns)
    Config(String),

    /// Blob store could not be opened or reached
    Storage(String),

    /// Internal errors (server bootstrap, runtime setup, unexpected errors)
    Internal(String),
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ProxyError::Storage(msg) => write!(f, "Storage error: {}", msg),
            ProxyError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ProxyError {}

impl ProxyError {
    /// Exit code used by the binary when startup fails
    pub fn exit_code(&self) -> i32 {
        match self {
            ProxyError::Config(_) => 2,
            _ => 1,
        }
    }
}

impl From<crate::storage::StorageError> for ProxyError {
    fn from(error: crate::storage::StorageError) -> Self {
        ProxyError::Storage(error.to_string())
    }
}
