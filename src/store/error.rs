//! Error types for document store operations.

use std::time::Duration;
use thiserror::Error;

/// Error type for document store client calls.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Document {id} not found in index {index}")]
    NotFound { index: String, id: String },

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Index already exists: {0}")]
    IndexAlreadyExists(String),

    #[error("Scroll cursor expired: {0}")]
    CursorExpired(String),

    #[error("Reindex task not found: {0}")]
    TaskNotFound(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Create an unavailable error with a message
    pub fn unavailable(msg: impl Into<String>) -> Self {
        StoreError::Unavailable(msg.into())
    }

    /// Whether a retry of the same call may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Timeout(_))
    }
}
