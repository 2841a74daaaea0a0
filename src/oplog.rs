//! Fire-and-forget operation log for repository writes.
//!
//! When enabled, every repository write is handed to an [`OperationLog`] sink
//! on a background task. Writers never wait on the sink and a failing sink
//! never fails the write; sink errors are logged and dropped.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Index,
    Update,
    Delete,
    Bulk,
}

/// One recorded write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub timestamp: DateTime<Utc>,
    pub kind: OperationKind,
    pub index: String,
    pub payload: Value,
}

#[derive(Debug, Error)]
pub enum OperationLogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Operation log sink rejected record: {0}")]
    Rejected(String),
}

/// Destination for operation records.
#[async_trait]
pub trait OperationLog: Send + Sync {
    async fn write(&self, record: &OperationRecord) -> Result<(), OperationLogError>;
}

/// Appends records as JSON lines to a file.
pub struct JsonlOperationLog {
    path: PathBuf,
}

impl JsonlOperationLog {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl OperationLog for JsonlOperationLog {
    async fn write(&self, record: &OperationRecord) -> Result<(), OperationLogError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }
}

/// Cheap handle repositories use to record writes.
///
/// A disabled logger drops every record.
#[derive(Clone, Default)]
pub struct OperationLogger {
    sender: Option<mpsc::UnboundedSender<OperationRecord>>,
}

impl OperationLogger {
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Start a background task draining records into `sink`.
    ///
    /// The task ends once every logger handle is dropped.
    pub fn spawn(sink: Arc<dyn OperationLog>) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::unbounded_channel::<OperationRecord>();
        let handle = tokio::spawn(async move {
            while let Some(record) = receiver.recv().await {
                if let Err(e) = sink.write(&record).await {
                    warn!(
                        index = %record.index,
                        kind = ?record.kind,
                        error = %e,
                        "Failed to write operation log record"
                    );
                }
            }
            debug!("Operation log drained");
        });
        (
            Self {
                sender: Some(sender),
            },
            handle,
        )
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    pub fn record(&self, kind: OperationKind, index: &str, payload: Value) {
        let Some(sender) = &self.sender else {
            return;
        };
        let record = OperationRecord {
            timestamp: Utc::now(),
            kind,
            index: index.to_string(),
            payload,
        };
        if sender.send(record).is_err() {
            debug!(index, "Operation log task stopped; record dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct CollectingLog {
        records: Mutex<Vec<OperationRecord>>,
    }

    #[async_trait]
    impl OperationLog for CollectingLog {
        async fn write(&self, record: &OperationRecord) -> Result<(), OperationLogError> {
            self.records.lock().await.push(record.clone());
            Ok(())
        }
    }

    struct FailingLog;

    #[async_trait]
    impl OperationLog for FailingLog {
        async fn write(&self, _record: &OperationRecord) -> Result<(), OperationLogError> {
            Err(OperationLogError::Rejected("sink offline".to_string()))
        }
    }

    #[tokio::test]
    async fn test_records_reach_sink_in_order() {
        let sink = Arc::new(CollectingLog::default());
        let (logger, handle) = OperationLogger::spawn(sink.clone());
        logger.record(OperationKind::Index, "publications", json!({ "id": "p1" }));
        logger.record(OperationKind::Delete, "publications", json!({ "id": "p2" }));
        drop(logger);
        handle.await.unwrap();

        let records = sink.records.lock().await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].kind, OperationKind::Index);
        assert_eq!(records[1].payload["id"], "p2");
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_propagate() {
        let (logger, handle) = OperationLogger::spawn(Arc::new(FailingLog));
        logger.record(OperationKind::Bulk, "binders", json!({}));
        drop(logger);
        handle.await.unwrap();
    }

    #[test]
    fn test_disabled_logger_drops_records() {
        let logger = OperationLogger::disabled();
        assert!(!logger.is_enabled());
        logger.record(OperationKind::Update, "binders", json!({}));
    }

    #[tokio::test]
    async fn test_jsonl_sink_appends_lines() {
        let dir = tempdir().unwrap();
        let sink = JsonlOperationLog::new(dir.path().join("operations.jsonl"));
        for id in ["a", "b"] {
            sink.write(&OperationRecord {
                timestamp: Utc::now(),
                kind: OperationKind::Index,
                index: "binders".to_string(),
                payload: json!({ "id": id }),
            })
            .await
            .unwrap();
        }
        let content = tokio::fs::read_to_string(sink.path()).await.unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: OperationRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.payload["id"], "a");
    }
}
