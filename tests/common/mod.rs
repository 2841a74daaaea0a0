//! Common test utilities
#![allow(dead_code)]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use async_trait::async_trait;
use binders_repository::config::IndicesConfig;
use binders_repository::duplication::{
    AssetService, AssetServiceError, DuplicatedAsset, DuplicatedFormat,
};
use binders_repository::item::core::repository::RepositorySettings;
use binders_repository::item::entities::{
    Binder, Collection, CollectionElement, Language, Publication,
};
use binders_repository::item::repositories::Repositories;
use binders_repository::oplog::OperationLogger;
use binders_repository::store::{
    BulkOperation, BulkResponse, DocumentStore, Hit, IndexDefinition, MemoryStore, Query,
    Refresh, RetryPolicy, ScrollPage, ScrollSettings, SearchRequest, StoreError, TaskStatus,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub const ACCOUNT: &str = "acc-1";

/// Repository settings with small pages and no retry delays.
pub fn test_settings() -> RepositorySettings {
    RepositorySettings {
        retry: RetryPolicy::no_retry(),
        scroll: ScrollSettings {
            page_size: 3,
            keep_alive: Duration::from_secs(60),
        },
    }
}

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub repos: Repositories,
}

/// An empty store with all three entity indices and aliases in place.
pub async fn setup() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let indices = IndicesConfig::default();
    Repositories::bootstrap(store.as_ref(), &indices)
        .await
        .expect("Failed to bootstrap indices");
    let repos = Repositories::new(
        store.clone(),
        &indices,
        &test_settings(),
        &OperationLogger::disabled(),
    );
    Fixture { store, repos }
}

pub async fn create_binder(repos: &Repositories) -> Binder {
    repos
        .binders
        .create_binder(Binder::new(ACCOUNT, Language::new("en", "Manual")))
        .await
        .expect("Failed to create binder")
}

pub async fn create_collection(repos: &Repositories, title: &str, elements: Vec<CollectionElement>) -> Collection {
    let mut collection = Collection::new(ACCOUNT, "en", title);
    collection.elements = elements;
    repos
        .collections
        .create_collection(collection)
        .await
        .expect("Failed to create collection")
}

/// Store an active publication directly, without touching any flags.
pub async fn activate_publication(repos: &Repositories, binder: &Binder) -> Publication {
    let binder_id = binder.id.clone().unwrap();
    let mut publication =
        Publication::from_binder(&binder_id, binder, binder.languages[0].clone());
    publication.is_active = true;
    repos
        .publications
        .save_publication(publication)
        .await
        .expect("Failed to save publication")
}

pub async fn flag(repos: &Repositories, collection: &Collection) -> bool {
    repos
        .collections
        .get_collection(collection.id.as_deref().unwrap())
        .await
        .unwrap()
        .has_publications
}

pub fn doc_ref(binder: &Binder) -> CollectionElement {
    CollectionElement::document(binder.id.clone().unwrap())
}

pub fn col_ref(collection: &Collection) -> CollectionElement {
    CollectionElement::collection(collection.id.clone().unwrap())
}

/// Store wrapper injecting faults into an otherwise healthy [`MemoryStore`].
pub struct FaultyStore {
    pub inner: Arc<MemoryStore>,
    /// Drop one document from the destination right after a reindex.
    pub lose_document_on_reindex: AtomicBool,
    /// Number of upcoming searches that fail with `Unavailable`.
    pub failing_searches: AtomicUsize,
    pub search_calls: AtomicUsize,
}

impl FaultyStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            lose_document_on_reindex: AtomicBool::new(false),
            failing_searches: AtomicUsize::new(0),
            search_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DocumentStore for FaultyStore {
    async fn get(&self, index: &str, id: &str) -> Result<Hit, StoreError> {
        self.inner.get(index, id).await
    }

    async fn search(&self, index: &str, request: &SearchRequest) -> Result<Vec<Hit>, StoreError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failing_searches.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_searches.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::unavailable("injected outage"));
        }
        self.inner.search(index, request).await
    }

    async fn count(&self, index: &str, query: &Query) -> Result<usize, StoreError> {
        self.inner.count(index, query).await
    }

    async fn open_scroll(
        &self,
        index: &str,
        request: &SearchRequest,
        settings: &ScrollSettings,
    ) -> Result<ScrollPage, StoreError> {
        self.inner.open_scroll(index, request, settings).await
    }

    async fn next_scroll(&self, scroll_id: &str, keep_alive: Duration) -> Result<ScrollPage, StoreError> {
        self.inner.next_scroll(scroll_id, keep_alive).await
    }

    async fn clear_scroll(&self, scroll_id: &str) -> Result<(), StoreError> {
        self.inner.clear_scroll(scroll_id).await
    }

    async fn bulk(
        &self,
        index: &str,
        operations: &[BulkOperation],
        refresh: Refresh,
    ) -> Result<BulkResponse, StoreError> {
        self.inner.bulk(index, operations, refresh).await
    }

    async fn create_index(&self, name: &str, definition: &IndexDefinition) -> Result<(), StoreError> {
        self.inner.create_index(name, definition).await
    }

    async fn delete_index(&self, name: &str) -> Result<(), StoreError> {
        self.inner.delete_index(name).await
    }

    async fn index_exists(&self, name: &str) -> Result<bool, StoreError> {
        self.inner.index_exists(name).await
    }

    async fn update_alias(&self, alias: &str, index: &str) -> Result<(), StoreError> {
        self.inner.update_alias(alias, index).await
    }

    async fn resolve_alias(&self, alias: &str) -> Result<Vec<String>, StoreError> {
        self.inner.resolve_alias(alias).await
    }

    async fn start_reindex(&self, source: &str, destination: &str) -> Result<String, StoreError> {
        let task_id = self.inner.start_reindex(source, destination).await?;
        if self.lose_document_on_reindex.load(Ordering::SeqCst) {
            let victim = self
                .inner
                .search(destination, &SearchRequest::match_all().with_size(1))
                .await?;
            if let Some(hit) = victim.into_iter().next() {
                self.inner
                    .bulk(destination, &[BulkOperation::Delete { id: hit.id }], Refresh::WaitFor)
                    .await?;
            }
        }
        Ok(task_id)
    }

    async fn task_status(&self, task_id: &str) -> Result<TaskStatus, StoreError> {
        self.inner.task_status(task_id).await
    }
}

/// Asset service that mints new asset ids by suffixing the originals.
pub struct FakeAssetService {
    /// Original asset ids owned by each item.
    pub owned: Mutex<std::collections::HashMap<String, Vec<String>>>,
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
}

impl FakeAssetService {
    pub fn new() -> Self {
        Self {
            owned: Mutex::new(std::collections::HashMap::new()),
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub async fn own(&self, owner: &str, asset_ids: &[&str]) {
        self.owned.lock().await.insert(
            owner.to_string(),
            asset_ids.iter().map(|id| (*id).to_string()).collect(),
        );
    }
}

pub fn asset_url(asset_id: &str, format: &str) -> String {
    format!("https://images.example.com/images/v1/{asset_id}/{format}")
}

#[async_trait]
impl AssetService for FakeAssetService {
    async fn duplicate_assets(
        &self,
        source_owner_id: &str,
        _target_owner_id: &str,
    ) -> Result<Vec<DuplicatedAsset>, AssetServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(AssetServiceError::Unavailable("image service down".to_string()));
        }
        let owned = self.owned.lock().await;
        let ids = owned.get(source_owner_id).cloned().unwrap_or_default();
        Ok(ids
            .into_iter()
            .map(|original_id| {
                let new_id = format!("{original_id}-copy");
                DuplicatedAsset {
                    formats: ["ORIGINAL", "MEDIUM", "THUMBNAIL"]
                        .into_iter()
                        .map(|name| DuplicatedFormat {
                            name: name.to_string(),
                            original_url: asset_url(&original_id, name),
                            url: asset_url(&new_id, name),
                        })
                        .collect(),
                    original_id,
                    new_id,
                }
            })
            .collect())
    }
}
