//! Error types for Engram

use thiserror::Error;

/// Result type alias for Engram operations
pub type Result<T> = std::result::Result<T, EngramError>;

/// Main error type for Engram
#[derive(Error, Debug)]
pub enum EngramError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sync error: {0}")]
    Sync(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EngramError {
    /// Get error code for the MCP protocol
    pub fn code(&self) -> i64 {
        match self {
            EngramError::NotFound(_) => -32001,
            EngramError::InvalidInput(_) => -32602,
            _ => -32000,
        }
    }
}
