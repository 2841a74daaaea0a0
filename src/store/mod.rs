//! Document store client.
//!
//! [`DocumentStore`] is the seam between repositories and the search-indexed
//! backend. It models an index-and-alias store: documents live in physical
//! indices, readers and writers address them through aliases, large result
//! sets are read through server-side scroll cursors, and writes are batched
//! through bulk calls with per-item outcomes.
//!
//! [`MemoryStore`] is the in-process implementation used by the binary and by
//! tests. It can be loaded from and saved to a JSON snapshot.

mod bulk;
mod error;
mod memory;
mod query;
mod retry;
mod scroll;

pub use bulk::{
    BulkFailure, BulkItemResult, BulkItemStatus, BulkOperation, BulkOptions, BulkReport,
    BulkResponse, Refresh,
};
pub use error::StoreError;
pub use memory::{MemoryStore, StoreSnapshot, StoredIndex};
pub use query::{
    compare_values, field_values, Hit, Query, SearchRequest, Sort, ID_FIELD, MAX_SEARCH_RESULTS,
};
pub use retry::RetryPolicy;
pub use scroll::{scan, ScanControl, ScrollCursor, ScrollPage, ScrollSettings};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Mapping and settings used when creating a physical index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexDefinition {
    #[serde(default)]
    pub mappings: Value,
    #[serde(default)]
    pub settings: Value,
}

/// Progress of a server-side reindex task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub task_id: String,
    pub completed: bool,
    pub total: usize,
    pub created: usize,
    #[serde(default)]
    pub failures: Vec<String>,
}

/// Client for a search-indexed document store.
///
/// Index names may be physical indices or aliases; implementations resolve
/// aliases on every call. `search` and `count` accept comma separated names.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, index: &str, id: &str) -> Result<Hit, StoreError>;

    async fn search(&self, index: &str, request: &SearchRequest) -> Result<Vec<Hit>, StoreError>;

    async fn count(&self, index: &str, query: &Query) -> Result<usize, StoreError>;

    /// Open a cursor and return its first page.
    async fn open_scroll(
        &self,
        index: &str,
        request: &SearchRequest,
        settings: &ScrollSettings,
    ) -> Result<ScrollPage, StoreError>;

    /// Advance a cursor, renewing its keep-alive.
    async fn next_scroll(&self, scroll_id: &str, keep_alive: Duration)
        -> Result<ScrollPage, StoreError>;

    async fn clear_scroll(&self, scroll_id: &str) -> Result<(), StoreError>;

    async fn bulk(
        &self,
        index: &str,
        operations: &[BulkOperation],
        refresh: Refresh,
    ) -> Result<BulkResponse, StoreError>;

    async fn create_index(&self, name: &str, definition: &IndexDefinition)
        -> Result<(), StoreError>;

    async fn delete_index(&self, name: &str) -> Result<(), StoreError>;

    async fn index_exists(&self, name: &str) -> Result<bool, StoreError>;

    /// Point `alias` at `index`, removing every previous target in one step.
    async fn update_alias(&self, alias: &str, index: &str) -> Result<(), StoreError>;

    /// Physical indices an alias points to. Empty when the alias is unknown.
    async fn resolve_alias(&self, alias: &str) -> Result<Vec<String>, StoreError>;

    /// Start copying every document from `source` into `destination`.
    async fn start_reindex(&self, source: &str, destination: &str) -> Result<String, StoreError>;

    async fn task_status(&self, task_id: &str) -> Result<TaskStatus, StoreError>;
}
