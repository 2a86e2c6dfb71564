// src/core/errors.rs

//! Defines the primary error type for the replication core.

use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all possible failures within the
/// replication core. Using `thiserror` allows for clean error definitions
/// and automatic `From` trait implementations.
#[derive(Error, Debug, Clone)]
pub enum CitrineDBError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Send Error: {0}")]
    SendFailed(String),

    #[error("No response received for request {0}")]
    NoResponse(String),

    #[error("Response Dispatch Error: {0}")]
    Dispatch(String),

    #[error("Execution Error: {0}")]
    Execution(String),

    #[error("Locking Error: {0}")]
    Locking(String),

    #[error("Storage Error: {0}")]
    Storage(String),

    #[error("Replication worker interrupted")]
    Interrupted,

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for CitrineDBError {
    fn from(e: std::io::Error) -> Self {
        CitrineDBError::Io(Arc::new(e))
    }
}

impl From<serde_json::Error> for CitrineDBError {
    fn from(e: serde_json::Error) -> Self {
        CitrineDBError::Internal(format!("JSON serialization/deserialization error: {e}"))
    }
}
