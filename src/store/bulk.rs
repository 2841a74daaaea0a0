//! Bulk write model and outcome accounting.
//!
//! A bulk call returns one [`BulkItemResult`] per submitted operation.
//! [`BulkReport`] folds those into counts. Under create-only semantics a
//! "document already exists" outcome is an expected, ignorable result and is
//! counted separately from real failures.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single operation in a bulk request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BulkOperation {
    /// Upsert a full document. Without an id the store assigns one.
    Index {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        document: Value,
    },
    /// Write only if no document with this id exists.
    Create { id: String, document: Value },
    /// Merge top-level fields into an existing document.
    Update { id: String, partial: Value },
    Delete { id: String },
}

impl BulkOperation {
    /// Id targeted by the operation, if known before execution.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match self {
            BulkOperation::Index { id, .. } => id.as_deref(),
            BulkOperation::Create { id, .. }
            | BulkOperation::Update { id, .. }
            | BulkOperation::Delete { id } => Some(id),
        }
    }
}

/// Visibility requested for writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Refresh {
    /// No visibility guarantee.
    None,
    /// Force a refresh before returning.
    Immediate,
    /// Return once the write is searchable.
    #[default]
    WaitFor,
}

/// Per-operation outcome of a bulk call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum BulkItemStatus {
    Ok,
    AlreadyExists,
    NotFound,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkItemResult {
    pub id: String,
    pub status: BulkItemStatus,
}

/// Raw result of a bulk call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkResponse {
    pub items: Vec<BulkItemResult>,
}

impl BulkResponse {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.items
            .iter()
            .any(|item| item.status != BulkItemStatus::Ok)
    }
}

/// Options for repository-level bulk writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BulkOptions {
    /// Treat "already exists" outcomes as success.
    pub ignore_duplicates: bool,
    pub refresh: Refresh,
}

impl BulkOptions {
    /// Create-only writes where existing documents are left alone.
    #[must_use]
    pub fn create_only() -> Self {
        Self {
            ignore_duplicates: true,
            refresh: Refresh::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkFailure {
    pub id: String,
    pub reason: String,
}

/// Aggregated outcome of one or more bulk calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkReport {
    pub succeeded: usize,
    pub duplicates: usize,
    pub failures: Vec<BulkFailure>,
}

impl BulkReport {
    #[must_use]
    pub fn from_response(response: &BulkResponse, ignore_duplicates: bool) -> Self {
        let mut report = Self::default();
        for item in &response.items {
            match &item.status {
                BulkItemStatus::Ok => report.succeeded = report.succeeded.saturating_add(1),
                BulkItemStatus::AlreadyExists if ignore_duplicates => {
                    report.duplicates = report.duplicates.saturating_add(1);
                }
                BulkItemStatus::AlreadyExists => report.failures.push(BulkFailure {
                    id: item.id.clone(),
                    reason: "document already exists".to_string(),
                }),
                BulkItemStatus::NotFound => report.failures.push(BulkFailure {
                    id: item.id.clone(),
                    reason: "document not found".to_string(),
                }),
                BulkItemStatus::Failed(reason) => report.failures.push(BulkFailure {
                    id: item.id.clone(),
                    reason: reason.clone(),
                }),
            }
        }
        report
    }

    pub fn merge(&mut self, other: BulkReport) {
        self.succeeded = self.succeeded.saturating_add(other.succeeded);
        self.duplicates = self.duplicates.saturating_add(other.duplicates);
        self.failures.extend(other.failures);
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, status: BulkItemStatus) -> BulkItemResult {
        BulkItemResult {
            id: id.to_string(),
            status,
        }
    }

    #[test]
    fn test_duplicates_ignored_under_create_only() {
        let response = BulkResponse {
            items: vec![
                item("a", BulkItemStatus::Ok),
                item("b", BulkItemStatus::AlreadyExists),
                item("c", BulkItemStatus::Ok),
            ],
        };
        let report = BulkReport::from_response(&response, true);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.duplicates, 1);
        assert!(report.is_clean());
    }

    #[test]
    fn test_duplicates_fail_when_not_ignored() {
        let response = BulkResponse {
            items: vec![item("b", BulkItemStatus::AlreadyExists)],
        };
        let report = BulkReport::from_response(&response, false);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures.first().map(|f| f.id.as_str()), Some("b"));
    }

    #[test]
    fn test_merge_accumulates() {
        let mut total = BulkReport {
            succeeded: 3,
            duplicates: 1,
            failures: vec![],
        };
        total.merge(BulkReport {
            succeeded: 2,
            duplicates: 0,
            failures: vec![BulkFailure {
                id: "x".to_string(),
                reason: "mapping".to_string(),
            }],
        });
        assert_eq!(total.succeeded, 5);
        assert_eq!(total.duplicates, 1);
        assert!(!total.is_clean());
    }

    #[test]
    fn test_operation_ids() {
        let op = BulkOperation::Index {
            id: None,
            document: Value::Null,
        };
        assert_eq!(op.id(), None);
        let op = BulkOperation::Delete {
            id: "d".to_string(),
        };
        assert_eq!(op.id(), Some("d"));
    }
}
