//! Unified error types for repository operations.

use crate::store::{BulkFailure, StoreError};
use thiserror::Error;

/// Unified error type for repository adapters and the operations built on them.
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Invalid item: {0}")]
    InvalidItem(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Scroll cursor expired: {0}")]
    CursorExpired(String),

    #[error("Bulk write partially failed: {} failed, {succeeded} succeeded", failures.len())]
    PartialBulkFailure {
        succeeded: usize,
        failures: Vec<BulkFailure>,
    },

    #[error("Adding {child} to {parent} would create a circular path")]
    CircularPath { parent: String, child: String },

    #[error("Binder {0} has active publications")]
    BinderHasPublications(String),

    #[error("Binder {binder} belongs to deleted group {group}")]
    DeletedGroupMember { binder: String, group: String },

    #[error("Collection nesting deeper than {0} levels")]
    DepthExceeded(usize),

    #[error("Asset service error: {0}")]
    AssetService(String),

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl RepositoryError {
    /// Create a not found error
    pub fn not_found(id: impl Into<String>) -> Self {
        RepositoryError::NotFound(id.into())
    }

    /// Create an invalid item error
    pub fn invalid(msg: impl Into<String>) -> Self {
        RepositoryError::InvalidItem(msg.into())
    }
}

impl From<StoreError> for RepositoryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { id, .. } => RepositoryError::NotFound(id),
            StoreError::Unavailable(msg) => RepositoryError::StoreUnavailable(msg),
            StoreError::Timeout(after) => {
                RepositoryError::StoreUnavailable(format!("timed out after {after:?}"))
            }
            StoreError::CursorExpired(id) => RepositoryError::CursorExpired(id),
            StoreError::Json(e) => RepositoryError::JsonError(e),
            other => RepositoryError::Store(other),
        }
    }
}
