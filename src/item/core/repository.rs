//! Generic repository over one aliased index.
//!
//! [`IndexedRepository`] maps typed items to store documents. The item id is
//! the document id and is stripped from the stored source. Every store call
//! runs under the repository's [`RetryPolicy`]; writes are reported to the
//! operation log when one is attached.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::RepositoryError;
use super::filter::{ItemFilter, SearchOptions};
use crate::config::IndexNames;
use crate::item::ItemKind;
use crate::oplog::{OperationKind, OperationLogger};
use crate::store::{
    BulkItemStatus, BulkOperation, BulkOptions, BulkReport, DocumentStore, Hit, Query, Refresh,
    RetryPolicy, ScanControl, ScrollCursor, ScrollSettings, SearchRequest,
};

/// An item persisted as one document in an index.
pub trait StoredItem: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: ItemKind;

    fn id(&self) -> Option<&str>;

    fn set_id(&mut self, id: String);
}

/// Retry and scroll behavior shared by repositories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositorySettings {
    pub retry: RetryPolicy,
    pub scroll: ScrollSettings,
}

pub struct IndexedRepository<T> {
    store: Arc<dyn DocumentStore>,
    names: IndexNames,
    settings: RepositorySettings,
    oplog: OperationLogger,
    marker: PhantomData<fn() -> T>,
}

impl<T> Clone for IndexedRepository<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            names: self.names.clone(),
            settings: self.settings.clone(),
            oplog: self.oplog.clone(),
            marker: PhantomData,
        }
    }
}

impl<T: StoredItem> IndexedRepository<T> {
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        names: IndexNames,
        settings: RepositorySettings,
    ) -> Self {
        Self {
            store,
            names,
            settings,
            oplog: OperationLogger::disabled(),
            marker: PhantomData,
        }
    }

    #[must_use]
    pub fn with_operation_log(mut self, oplog: OperationLogger) -> Self {
        self.oplog = oplog;
        self
    }

    /// Alias every read and write goes through.
    #[must_use]
    pub fn alias(&self) -> &str {
        &self.names.alias
    }

    #[must_use]
    pub fn names(&self) -> &IndexNames {
        &self.names
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    #[must_use]
    pub fn settings(&self) -> &RepositorySettings {
        &self.settings
    }

    /// Build an item from a hit, restoring its id from the document id.
    pub fn decode(hit: Hit) -> Result<T, RepositoryError> {
        let mut source = hit.source;
        let Some(fields) = source.as_object_mut() else {
            return Err(RepositoryError::invalid(format!(
                "{} {} is not a JSON object",
                T::KIND,
                hit.id
            )));
        };
        fields.insert("id".to_string(), Value::String(hit.id));
        Ok(serde_json::from_value(source)?)
    }

    /// Split an item into its id and the source stored for it.
    pub fn encode(item: &T) -> Result<(Option<String>, Value), RepositoryError> {
        let mut source = serde_json::to_value(item)?;
        if let Some(fields) = source.as_object_mut() {
            fields.remove("id");
        }
        Ok((item.id().map(str::to_string), source))
    }

    pub async fn get(&self, id: &str) -> Result<T, RepositoryError> {
        let store = self.store.as_ref();
        let alias = self.alias();
        let hit = self
            .settings
            .retry
            .run("get", move || store.get(alias, id))
            .await?;
        Self::decode(hit)
    }

    pub async fn exists(&self, id: &str) -> Result<bool, RepositoryError> {
        match self.get(id).await {
            Ok(_) => Ok(true),
            Err(RepositoryError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<T>, RepositoryError> {
        let store = self.store.as_ref();
        let alias = self.alias();
        let hits = self
            .settings
            .retry
            .run("search", move || store.search(alias, request))
            .await?;
        hits.into_iter().map(Self::decode).collect()
    }

    pub async fn find(
        &self,
        filter: &ItemFilter,
        options: &SearchOptions,
    ) -> Result<Vec<T>, RepositoryError> {
        self.search(&options.to_request(filter.to_query())).await
    }

    pub async fn count(&self, filter: &ItemFilter) -> Result<usize, RepositoryError> {
        let query = filter.to_query();
        self.count_query(&query).await
    }

    pub async fn count_query(&self, query: &Query) -> Result<usize, RepositoryError> {
        let store = self.store.as_ref();
        let alias = self.alias();
        Ok(self
            .settings
            .retry
            .run("count", move || store.count(alias, query))
            .await?)
    }

    /// Upsert an item. Items without an id get one assigned by the store.
    pub async fn save(&self, item: T) -> Result<T, RepositoryError> {
        let (id, document) = Self::encode(&item)?;
        let payload = json!({ "id": id, "document": document });
        let operation = BulkOperation::Index { id, document };
        let assigned = self.write_one(operation, Refresh::WaitFor).await?;
        self.oplog.record(OperationKind::Index, self.alias(), payload);
        let mut saved = item;
        saved.set_id(assigned);
        Ok(saved)
    }

    /// Replace an existing item.
    pub async fn update(&self, item: T) -> Result<T, RepositoryError> {
        let Some(id) = item.id() else {
            return Err(RepositoryError::invalid(format!(
                "cannot update a {} without an id",
                T::KIND
            )));
        };
        if !self.exists(id).await? {
            return Err(RepositoryError::not_found(id));
        }
        self.save(item).await
    }

    /// Merge top-level fields into a stored item.
    pub async fn patch(&self, id: &str, partial: Value) -> Result<(), RepositoryError> {
        let payload = json!({ "id": id, "partial": partial });
        self.write_one(
            BulkOperation::Update {
                id: id.to_string(),
                partial,
            },
            Refresh::WaitFor,
        )
        .await?;
        self.oplog.record(OperationKind::Update, self.alias(), payload);
        Ok(())
    }

    /// Permanently remove an item.
    pub async fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        self.write_one(
            BulkOperation::Delete { id: id.to_string() },
            Refresh::WaitFor,
        )
        .await?;
        self.oplog
            .record(OperationKind::Delete, self.alias(), json!({ "id": id }));
        Ok(())
    }

    async fn write_one(
        &self,
        operation: BulkOperation,
        refresh: Refresh,
    ) -> Result<String, RepositoryError> {
        let operations = [operation];
        let store = self.store.as_ref();
        let alias = self.alias();
        let ops = operations.as_slice();
        let response = self
            .settings
            .retry
            .run("write", move || store.bulk(alias, ops, refresh))
            .await?;
        let Some(item) = response.items.into_iter().next() else {
            return Err(RepositoryError::invalid("store returned no bulk item"));
        };
        match item.status {
            BulkItemStatus::Ok => Ok(item.id),
            BulkItemStatus::NotFound => Err(RepositoryError::NotFound(item.id)),
            BulkItemStatus::AlreadyExists => Err(RepositoryError::invalid(format!(
                "{} {} already exists",
                T::KIND,
                item.id
            ))),
            BulkItemStatus::Failed(reason) => Err(RepositoryError::invalid(format!(
                "{} {}: {reason}",
                T::KIND,
                item.id
            ))),
        }
    }

    /// Run raw bulk operations.
    ///
    /// Returns [`RepositoryError::PartialBulkFailure`] when any operation
    /// failed. Duplicate outcomes count as failures unless the options ignore
    /// them.
    pub async fn bulk_operations(
        &self,
        operations: &[BulkOperation],
        options: BulkOptions,
    ) -> Result<BulkReport, RepositoryError> {
        if operations.is_empty() {
            return Ok(BulkReport::default());
        }
        let store = self.store.as_ref();
        let alias = self.alias();
        let refresh = options.refresh;
        let response = self
            .settings
            .retry
            .run("bulk", move || store.bulk(alias, operations, refresh))
            .await?;
        let report = BulkReport::from_response(&response, options.ignore_duplicates);
        self.oplog.record(
            OperationKind::Bulk,
            self.alias(),
            json!({
                "operations": operations.len(),
                "succeeded": report.succeeded,
                "failed": report.failures.len(),
            }),
        );
        if report.is_clean() {
            debug!(
                index = %self.alias(),
                succeeded = report.succeeded,
                duplicates = report.duplicates,
                "Bulk write complete"
            );
            Ok(report)
        } else {
            warn!(
                index = %self.alias(),
                succeeded = report.succeeded,
                failed = report.failures.len(),
                "Bulk write partially failed"
            );
            Err(RepositoryError::PartialBulkFailure {
                succeeded: report.succeeded,
                failures: report.failures,
            })
        }
    }

    /// Upsert `to_save` and delete `to_delete` in one bulk call.
    pub async fn bulk(
        &self,
        to_save: &[T],
        to_delete: &[String],
        options: BulkOptions,
    ) -> Result<BulkReport, RepositoryError> {
        let mut operations = Vec::with_capacity(to_save.len().saturating_add(to_delete.len()));
        for item in to_save {
            let (id, document) = Self::encode(item)?;
            operations.push(match id {
                Some(id) if options.ignore_duplicates => BulkOperation::Create { id, document },
                id => BulkOperation::Index { id, document },
            });
        }
        operations.extend(
            to_delete
                .iter()
                .map(|id| BulkOperation::Delete { id: id.clone() }),
        );
        self.bulk_operations(&operations, options).await
    }

    pub async fn open_cursor(&self, request: &SearchRequest) -> Result<ScrollCursor, RepositoryError> {
        Ok(ScrollCursor::open(
            Arc::clone(&self.store),
            self.alias(),
            request,
            &self.settings.scroll,
            self.settings.retry.clone(),
        )
        .await?)
    }

    /// Stream every item matching `filter` to `handler`, one page at a time.
    ///
    /// Returns the number of items handed to the handler. The cursor is
    /// released even when the handler fails.
    pub async fn scan<F, Fut>(&self, filter: &ItemFilter, mut handler: F) -> Result<usize, RepositoryError>
    where
        F: FnMut(Vec<T>) -> Fut,
        Fut: Future<Output = Result<ScanControl, RepositoryError>>,
    {
        crate::store::scan(
            Arc::clone(&self.store),
            self.alias(),
            &SearchRequest::new(filter.to_query()),
            &self.settings.scroll,
            self.settings.retry.clone(),
            |page| {
                let pending = page
                    .into_iter()
                    .map(Self::decode)
                    .collect::<Result<Vec<_>, _>>()
                    .map(&mut handler);
                async move {
                    match pending {
                        Ok(handled) => handled.await,
                        Err(e) => Err(e),
                    }
                }
            },
        )
        .await
    }

    /// Ids of every item matching `filter`, read through a cursor.
    pub async fn find_ids(&self, filter: &ItemFilter) -> Result<Vec<String>, RepositoryError> {
        let mut cursor = self
            .open_cursor(&SearchRequest::new(filter.to_query()))
            .await?;
        let mut ids = Vec::new();
        let outcome = loop {
            match cursor.next_page().await {
                Ok(Some(page)) => ids.extend(page.into_iter().map(|hit| hit.id)),
                Ok(None) => break Ok(()),
                Err(e) => break Err(RepositoryError::from(e)),
            }
        };
        cursor.close().await;
        outcome.map(|()| ids)
    }

    /// Copy the stored document under a fresh id and return that id.
    pub async fn duplicate_record(&self, id: &str) -> Result<String, RepositoryError> {
        let store = self.store.as_ref();
        let alias = self.alias();
        let hit = self
            .settings
            .retry
            .run("get", move || store.get(alias, id))
            .await?;
        let new_id = Uuid::new_v4().to_string();
        self.write_one(
            BulkOperation::Create {
                id: new_id.clone(),
                document: hit.source,
            },
            Refresh::WaitFor,
        )
        .await?;
        self.oplog.record(
            OperationKind::Index,
            self.alias(),
            json!({ "id": new_id, "duplicateOf": id }),
        );
        let kind = T::KIND;
        debug!(kind = %kind, source = id, duplicate = %new_id, "Duplicated record");
        Ok(new_id)
    }
}

#[cfg(test)]
#[path = "repository_tests.rs"]
mod tests;
