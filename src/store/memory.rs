//! In-process document store.
//!
//! Behaves like the search-indexed backend for everything repositories rely
//! on: alias resolution, create-only writes reporting duplicates per item,
//! partial updates, snapshot scroll cursors with keep-alive expiry, and
//! reindex tasks. Writes are visible immediately, so every [`Refresh`] mode
//! behaves the same.

use super::query::compare_values;
use super::{
    field_values, BulkItemResult, BulkItemStatus, BulkOperation, BulkResponse, DocumentStore,
    Hit, IndexDefinition, Query, Refresh, ScrollPage, ScrollSettings, SearchRequest, Sort,
    StoreError, TaskStatus,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// A physical index and its documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredIndex {
    #[serde(default)]
    pub definition: IndexDefinition,
    #[serde(default)]
    pub documents: BTreeMap<String, Value>,
}

/// Serializable contents of a [`MemoryStore`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub indices: BTreeMap<String, StoredIndex>,
    /// Alias name to physical index name.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

impl StoreSnapshot {
    fn resolve(&self, name: &str) -> Result<String, StoreError> {
        if let Some(target) = self.aliases.get(name) {
            return Ok(target.clone());
        }
        if self.indices.contains_key(name) {
            return Ok(name.to_string());
        }
        Err(StoreError::IndexNotFound(name.to_string()))
    }

    fn resolve_many(&self, names: &str) -> Result<Vec<String>, StoreError> {
        names
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| self.resolve(name))
            .collect()
    }

    /// Resolve a write target, creating the physical index if nothing answers to `name`.
    fn resolve_for_write(&mut self, name: &str) -> String {
        match self.resolve(name) {
            Ok(resolved) => resolved,
            Err(_) => {
                debug!(index = name, "Auto-creating index on write");
                self.indices.insert(name.to_string(), StoredIndex::default());
                name.to_string()
            }
        }
    }

    fn matching_hits(&self, names: &str, query: &Query) -> Result<Vec<Hit>, StoreError> {
        let mut hits = Vec::new();
        for index in self.resolve_many(names)? {
            let Some(stored) = self.indices.get(&index) else {
                return Err(StoreError::IndexNotFound(index));
            };
            hits.extend(
                stored
                    .documents
                    .iter()
                    .filter(|(id, source)| query.matches(id, source))
                    .map(|(id, source)| Hit {
                        id: id.clone(),
                        index: index.clone(),
                        source: source.clone(),
                    }),
            );
        }
        Ok(hits)
    }
}

struct ScrollState {
    remaining: VecDeque<Hit>,
    page_size: usize,
    total: usize,
    expires_at: Instant,
}

#[derive(Default)]
struct StoreState {
    data: StoreSnapshot,
    scrolls: HashMap<String, ScrollState>,
    tasks: HashMap<String, TaskStatus>,
}

/// In-memory [`DocumentStore`].
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            state: RwLock::new(StoreState {
                data: snapshot,
                ..StoreState::default()
            }),
        }
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        self.state.read().await.data.clone()
    }

    /// Load a snapshot file, or start empty when the file does not exist.
    pub async fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            info!(path = %path.display(), "No snapshot found, starting with an empty store");
            return Ok(Self::new());
        }
        let content = tokio::fs::read_to_string(path).await?;
        let snapshot: StoreSnapshot = serde_json::from_str(&content)?;
        info!(
            path = %path.display(),
            indices = snapshot.indices.len(),
            aliases = snapshot.aliases.len(),
            "Loaded store snapshot"
        );
        Ok(Self::from_snapshot(snapshot))
    }

    /// Write the current contents to `path` atomically.
    pub async fn save(&self, path: &Path) -> Result<(), StoreError> {
        let snapshot = self.snapshot().await;
        let content = serde_json::to_string_pretty(&snapshot)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, content).await?;
        tokio::fs::rename(&temp_path, path).await?;
        debug!(path = %path.display(), "Saved store snapshot");
        Ok(())
    }
}

fn sort_hits(hits: &mut [Hit], sort: Option<&Sort>) {
    hits.sort_by(|a, b| {
        let by_field = sort.map_or(Ordering::Equal, |sort| {
            let left = field_values(&a.source, &sort.field)
                .first()
                .copied()
                .unwrap_or(&Value::Null);
            let right = field_values(&b.source, &sort.field)
                .first()
                .copied()
                .unwrap_or(&Value::Null);
            let ordering = compare_values(left, right);
            if sort.ascending {
                ordering
            } else {
                ordering.reverse()
            }
        });
        by_field
            .then_with(|| a.index.cmp(&b.index))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Recursively merge `partial` into `target`; non-object values replace.
fn merge_partial(target: &mut Map<String, Value>, partial: Map<String, Value>) {
    for (key, value) in partial {
        match (target.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_partial(existing, incoming);
            }
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

fn apply_operation(stored: &mut StoredIndex, operation: &BulkOperation) -> BulkItemResult {
    match operation {
        BulkOperation::Index { id, document } => {
            let id = id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
            if !document.is_object() {
                return failed(id, "document must be a JSON object");
            }
            stored.documents.insert(id.clone(), document.clone());
            ok(id)
        }
        BulkOperation::Create { id, document } => {
            if stored.documents.contains_key(id) {
                return BulkItemResult {
                    id: id.clone(),
                    status: BulkItemStatus::AlreadyExists,
                };
            }
            if !document.is_object() {
                return failed(id.clone(), "document must be a JSON object");
            }
            stored.documents.insert(id.clone(), document.clone());
            ok(id.clone())
        }
        BulkOperation::Update { id, partial } => {
            let Some(Value::Object(existing)) = stored.documents.get_mut(id) else {
                return BulkItemResult {
                    id: id.clone(),
                    status: BulkItemStatus::NotFound,
                };
            };
            let Value::Object(fields) = partial.clone() else {
                return failed(id.clone(), "partial document must be a JSON object");
            };
            merge_partial(existing, fields);
            ok(id.clone())
        }
        BulkOperation::Delete { id } => {
            if stored.documents.remove(id).is_some() {
                ok(id.clone())
            } else {
                BulkItemResult {
                    id: id.clone(),
                    status: BulkItemStatus::NotFound,
                }
            }
        }
    }
}

fn ok(id: String) -> BulkItemResult {
    BulkItemResult {
        id,
        status: BulkItemStatus::Ok,
    }
}

fn failed(id: String, reason: &str) -> BulkItemResult {
    BulkItemResult {
        id,
        status: BulkItemStatus::Failed(reason.to_string()),
    }
}

fn drain_page(state: &mut ScrollState) -> Vec<Hit> {
    let take = state.page_size.min(state.remaining.len());
    state.remaining.drain(..take).collect()
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, index: &str, id: &str) -> Result<Hit, StoreError> {
        let state = self.state.read().await;
        let resolved = state.data.resolve(index)?;
        state
            .data
            .indices
            .get(&resolved)
            .and_then(|stored| stored.documents.get(id))
            .map(|source| Hit {
                id: id.to_string(),
                index: resolved.clone(),
                source: source.clone(),
            })
            .ok_or_else(|| StoreError::NotFound {
                index: index.to_string(),
                id: id.to_string(),
            })
    }

    async fn search(&self, index: &str, request: &SearchRequest) -> Result<Vec<Hit>, StoreError> {
        let state = self.state.read().await;
        let mut hits = state.data.matching_hits(index, &request.query)?;
        sort_hits(&mut hits, request.sort.as_ref());
        hits.truncate(request.size);
        Ok(hits)
    }

    async fn count(&self, index: &str, query: &Query) -> Result<usize, StoreError> {
        let state = self.state.read().await;
        Ok(state.data.matching_hits(index, query)?.len())
    }

    async fn open_scroll(
        &self,
        index: &str,
        request: &SearchRequest,
        settings: &ScrollSettings,
    ) -> Result<ScrollPage, StoreError> {
        let mut state = self.state.write().await;
        let now = Instant::now();
        state.scrolls.retain(|_, scroll| scroll.expires_at >= now);

        let mut hits = state.data.matching_hits(index, &request.query)?;
        sort_hits(&mut hits, request.sort.as_ref());
        let total = hits.len();
        let mut scroll = ScrollState {
            remaining: hits.into(),
            page_size: settings.page_size.max(1),
            total,
            expires_at: now.checked_add(settings.keep_alive).unwrap_or(now),
        };
        let first = drain_page(&mut scroll);
        let scroll_id = Uuid::new_v4().to_string();
        state.scrolls.insert(scroll_id.clone(), scroll);
        debug!(index, total, scroll_id = %scroll_id, "Scroll opened");
        Ok(ScrollPage {
            scroll_id,
            hits: first,
            total,
        })
    }

    async fn next_scroll(
        &self,
        scroll_id: &str,
        keep_alive: Duration,
    ) -> Result<ScrollPage, StoreError> {
        let mut state = self.state.write().await;
        let now = Instant::now();
        let expired = match state.scrolls.get(scroll_id) {
            None => return Err(StoreError::CursorExpired(scroll_id.to_string())),
            Some(scroll) => scroll.expires_at < now,
        };
        if expired {
            state.scrolls.remove(scroll_id);
            return Err(StoreError::CursorExpired(scroll_id.to_string()));
        }
        let Some(scroll) = state.scrolls.get_mut(scroll_id) else {
            return Err(StoreError::CursorExpired(scroll_id.to_string()));
        };
        let hits = drain_page(scroll);
        scroll.expires_at = now.checked_add(keep_alive).unwrap_or(now);
        Ok(ScrollPage {
            scroll_id: scroll_id.to_string(),
            hits,
            total: scroll.total,
        })
    }

    async fn clear_scroll(&self, scroll_id: &str) -> Result<(), StoreError> {
        self.state.write().await.scrolls.remove(scroll_id);
        Ok(())
    }

    async fn bulk(
        &self,
        index: &str,
        operations: &[BulkOperation],
        refresh: Refresh,
    ) -> Result<BulkResponse, StoreError> {
        let mut state = self.state.write().await;
        let target = state.data.resolve_for_write(index);
        let stored = state.data.indices.entry(target.clone()).or_default();
        let items: Vec<BulkItemResult> = operations
            .iter()
            .map(|operation| apply_operation(stored, operation))
            .collect();
        debug!(
            index = %target,
            operations = operations.len(),
            refresh = ?refresh,
            "Bulk applied"
        );
        Ok(BulkResponse { items })
    }

    async fn create_index(
        &self,
        name: &str,
        definition: &IndexDefinition,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.data.indices.contains_key(name) || state.data.aliases.contains_key(name) {
            return Err(StoreError::IndexAlreadyExists(name.to_string()));
        }
        state.data.indices.insert(
            name.to_string(),
            StoredIndex {
                definition: definition.clone(),
                documents: BTreeMap::new(),
            },
        );
        info!(index = name, "Index created");
        Ok(())
    }

    async fn delete_index(&self, name: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.data.indices.remove(name).is_none() {
            return Err(StoreError::IndexNotFound(name.to_string()));
        }
        state.data.aliases.retain(|_, target| target != name);
        info!(index = name, "Index deleted");
        Ok(())
    }

    async fn index_exists(&self, name: &str) -> Result<bool, StoreError> {
        let state = self.state.read().await;
        Ok(state.data.indices.contains_key(name) || state.data.aliases.contains_key(name))
    }

    async fn update_alias(&self, alias: &str, index: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if !state.data.indices.contains_key(index) {
            return Err(StoreError::IndexNotFound(index.to_string()));
        }
        if state.data.indices.contains_key(alias) {
            return Err(StoreError::IndexAlreadyExists(alias.to_string()));
        }
        let previous = state
            .data
            .aliases
            .insert(alias.to_string(), index.to_string());
        info!(alias, index, previous = ?previous, "Alias updated");
        Ok(())
    }

    async fn resolve_alias(&self, alias: &str) -> Result<Vec<String>, StoreError> {
        let state = self.state.read().await;
        Ok(state.data.aliases.get(alias).cloned().into_iter().collect())
    }

    async fn start_reindex(&self, source: &str, destination: &str) -> Result<String, StoreError> {
        let mut state = self.state.write().await;
        let source_index = state.data.resolve(source)?;
        let documents = state
            .data
            .indices
            .get(&source_index)
            .map(|stored| stored.documents.clone())
            .unwrap_or_default();
        let target = state.data.resolve_for_write(destination);
        let total = documents.len();
        let stored = state.data.indices.entry(target.clone()).or_default();
        stored.documents.extend(documents);

        let task_id = format!("reindex:{}", Uuid::new_v4());
        state.tasks.insert(
            task_id.clone(),
            TaskStatus {
                task_id: task_id.clone(),
                completed: true,
                total,
                created: total,
                failures: Vec::new(),
            },
        );
        info!(source = %source_index, destination = %target, total, task_id = %task_id, "Reindex task finished");
        Ok(task_id)
    }

    async fn task_status(&self, task_id: &str) -> Result<TaskStatus, StoreError> {
        let state = self.state.read().await;
        state
            .tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| StoreError::TaskNotFound(task_id.to_string()))
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
