//! Types shared by the migration pipeline.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::item::RepositoryError;
use crate::store::{BulkFailure, StoreError};

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Scroll cursor {0} expired; the migration must restart from the beginning")]
    CursorExpired(String),

    #[error("Reindex count mismatch: expected {expected} documents, found {actual}")]
    ReindexCountMismatch { expected: usize, actual: usize },

    #[error("Reindex task {task_id} still running after {attempts} checks")]
    ReindexTaskIncomplete { task_id: String, attempts: u32 },

    #[error("Reindex task {task_id} reported failures: {}", failures.join("; "))]
    ReindexTaskFailed {
        task_id: String,
        failures: Vec<String>,
    },

    #[error("Invalid reindex plan: {0}")]
    InvalidPlan(String),

    #[error("Transform failed for {id}: {message}")]
    Transform { id: String, message: String },

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid URL pattern: {0}")]
    Regex(#[from] regex::Error),
}

impl From<StoreError> for MigrationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::CursorExpired(id) => MigrationError::CursorExpired(id),
            StoreError::Json(e) => MigrationError::JsonError(e),
            other => MigrationError::Store(other),
        }
    }
}

/// Output of a transform: the new document body and, optionally, its id.
///
/// Without an id the target store assigns one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformedDocument {
    pub data: Value,
    pub id: Option<String>,
}

impl TransformedDocument {
    #[must_use]
    pub fn with_id(id: impl Into<String>, data: Value) -> Self {
        Self {
            data,
            id: Some(id.into()),
        }
    }
}

/// Outcome of one scroll-transform-write run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub pages: usize,
    pub read: usize,
    pub written: usize,
    /// Records the transform chose not to write.
    pub skipped: usize,
    /// Create-only writes that hit an existing document.
    pub duplicates: usize,
    pub failures: Vec<BulkFailure>,
    /// Whether the run stopped early on an abort request.
    pub aborted: bool,
}

impl MigrationReport {
    /// Add the counts of another run to this one.
    pub fn absorb(&mut self, other: MigrationReport) {
        self.pages = self.pages.saturating_add(other.pages);
        self.read = self.read.saturating_add(other.read);
        self.written = self.written.saturating_add(other.written);
        self.skipped = self.skipped.saturating_add(other.skipped);
        self.duplicates = self.duplicates.saturating_add(other.duplicates);
        self.failures.extend(other.failures);
        self.aborted |= other.aborted;
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.aborted && self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_expiry_gets_its_own_variant() {
        let err = MigrationError::from(StoreError::CursorExpired("scroll-1".to_string()));
        assert!(matches!(err, MigrationError::CursorExpired(ref id) if id == "scroll-1"));
        assert!(err.to_string().contains("restart"));
    }

    #[test]
    fn test_other_store_errors_are_wrapped() {
        let err = MigrationError::from(StoreError::unavailable("down"));
        assert!(matches!(err, MigrationError::Store(StoreError::Unavailable(_))));
    }

    #[test]
    fn test_report_completeness() {
        let mut report = MigrationReport::default();
        assert!(report.is_complete());
        report.aborted = true;
        assert!(!report.is_complete());
    }
}
