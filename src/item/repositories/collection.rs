//! Repository adapter for collections.
//!
//! Besides plain CRUD this adapter answers the structural questions the tree
//! and flag logic ask: which collections contain an item, which of those
//! currently carry the publication flag, and what lies below a collection.

use chrono::Utc;
use serde_json::json;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info};

use crate::item::core::error::RepositoryError;
use crate::item::core::filter::{ItemFilter, SearchOptions};
use crate::item::core::repository::IndexedRepository;
use crate::item::entities::{Collection, CollectionElement, ElementKind};
use crate::store::{BulkOperation, BulkOptions, BulkReport, Query, Refresh};

#[derive(Clone)]
pub struct CollectionRepository {
    inner: IndexedRepository<Collection>,
}

impl CollectionRepository {
    #[must_use]
    pub fn new(inner: IndexedRepository<Collection>) -> Self {
        Self { inner }
    }

    #[must_use]
    pub fn repository(&self) -> &IndexedRepository<Collection> {
        &self.inner
    }

    /// Fetch a collection by id, deleted or not.
    pub async fn get_collection(&self, id: &str) -> Result<Collection, RepositoryError> {
        self.inner.get(id).await
    }

    pub async fn find_collections(
        &self,
        filter: &ItemFilter,
        options: &SearchOptions,
    ) -> Result<Vec<Collection>, RepositoryError> {
        self.inner.find(filter, options).await
    }

    /// Live collections with the given ids.
    pub async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<Collection>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.inner
            .find(
                &ItemFilter::new().with_ids(ids.iter().cloned()),
                &SearchOptions::limit(ids.len()),
            )
            .await
    }

    pub async fn create_collection(&self, mut collection: Collection) -> Result<Collection, RepositoryError> {
        if collection.account_id.trim().is_empty() {
            return Err(RepositoryError::invalid("collection has no account id"));
        }
        let now = Utc::now();
        collection.created = Some(now);
        collection.last_modified = Some(now);
        let collection = self.inner.save(collection).await?;
        info!(collection_id = ?collection.id, account_id = %collection.account_id, "Collection created");
        Ok(collection)
    }

    pub async fn update_collection(&self, mut collection: Collection) -> Result<Collection, RepositoryError> {
        collection.last_modified = Some(Utc::now());
        self.inner.update(collection).await
    }

    /// Read a collection, apply `change` and write it back.
    pub async fn patch_collection<F>(&self, id: &str, change: F) -> Result<Collection, RepositoryError>
    where
        F: FnOnce(&mut Collection),
    {
        let mut collection = self.inner.get(id).await?;
        change(&mut collection);
        self.update_collection(collection).await
    }

    /// Elements and deleted elements of each of the given collections, keyed
    /// by collection id.
    pub async fn child_element_map(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, Vec<CollectionElement>>, RepositoryError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let collections = self
            .inner
            .find(
                &ItemFilter::new().with_ids(ids.iter().cloned()).include_deleted(),
                &SearchOptions::limit(ids.len()),
            )
            .await?;
        Ok(collections
            .into_iter()
            .filter_map(|collection| {
                let id = collection.id?;
                let mut children = collection.elements;
                children.extend(collection.deleted_elements);
                Some((id, children))
            })
            .collect())
    }

    pub async fn soft_delete_collection(
        &self,
        id: &str,
        deleted_by: Option<&str>,
        group: Option<&str>,
    ) -> Result<Collection, RepositoryError> {
        self.inner.soft_delete(id, deleted_by, group).await
    }

    pub async fn recover_collection(&self, id: &str) -> Result<Collection, RepositoryError> {
        self.inner.recover(id).await
    }

    pub async fn hard_delete_collection(&self, id: &str) -> Result<(), RepositoryError> {
        self.inner.delete(id).await?;
        info!(collection_id = id, "Collection permanently deleted");
        Ok(())
    }

    pub async fn count_collections(&self, account_id: &str) -> Result<usize, RepositoryError> {
        self.inner
            .count(&ItemFilter::new().with_account(account_id))
            .await
    }

    /// Live collections whose live elements contain any of `child_ids`.
    pub async fn find_parents(&self, child_ids: &[String]) -> Result<Vec<Collection>, RepositoryError> {
        if child_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.inner
            .find(
                &ItemFilter::new().containing_elements(child_ids.iter().cloned()),
                &SearchOptions::default(),
            )
            .await
    }

    /// Live parents of `child_id` whose publication flag equals `flag`.
    pub async fn find_parents_with_flag(
        &self,
        child_id: &str,
        flag: bool,
    ) -> Result<Vec<Collection>, RepositoryError> {
        self.inner
            .find(
                &ItemFilter::new()
                    .containing_elements([child_id])
                    .matching(Query::term("hasPublications", flag)),
                &SearchOptions::default(),
            )
            .await
    }

    /// Live collections holding `child_id` among their deleted elements.
    pub async fn find_parents_of_deleted(&self, child_id: &str) -> Result<Vec<Collection>, RepositoryError> {
        self.inner
            .find(
                &ItemFilter::new().containing_deleted_elements([child_id]),
                &SearchOptions::default(),
            )
            .await
    }

    /// Set the publication flag on many collections in one bulk call.
    ///
    /// Ids that no longer exist are reported as failures.
    pub async fn multiset_flag(&self, ids: &[String], value: bool) -> Result<BulkReport, RepositoryError> {
        let operations: Vec<BulkOperation> = ids
            .iter()
            .map(|id| BulkOperation::Update {
                id: id.clone(),
                partial: json!({ "hasPublications": value }),
            })
            .collect();
        let report = self
            .inner
            .bulk_operations(
                &operations,
                BulkOptions {
                    ignore_duplicates: true,
                    refresh: Refresh::WaitFor,
                },
            )
            .await?;
        debug!(count = ids.len(), has_publications = value, "Publication flags set");
        Ok(report)
    }

    pub async fn set_ancestor_ids(&self, id: &str, ancestor_ids: &[String]) -> Result<(), RepositoryError> {
        self.inner
            .patch(id, json!({ "ancestorIds": ancestor_ids }))
            .await
    }

    /// Descendant elements of `root`, grouped by depth (1 = direct children).
    ///
    /// With `include_deleted` the deleted elements of each visited collection
    /// are followed as well. Fails with [`RepositoryError::DepthExceeded`]
    /// when nesting goes deeper than `max_depth`.
    pub async fn descendants_by_depth(
        &self,
        root: &Collection,
        include_deleted: bool,
        max_depth: usize,
    ) -> Result<BTreeMap<usize, Vec<CollectionElement>>, RepositoryError> {
        let mut levels = BTreeMap::new();
        let mut visited: HashSet<String> = root.id.iter().cloned().collect();
        let mut frontier = vec![root.clone()];
        let mut depth: usize = 0;
        while !frontier.is_empty() {
            depth = depth.saturating_add(1);
            let mut level = Vec::new();
            for collection in &frontier {
                let children = collection.elements.iter().chain(
                    include_deleted
                        .then_some(collection.deleted_elements.iter())
                        .into_iter()
                        .flatten(),
                );
                level.extend(children.filter(|e| visited.insert(e.key.clone())).cloned());
            }
            if level.is_empty() {
                break;
            }
            if depth > max_depth {
                return Err(RepositoryError::DepthExceeded(max_depth));
            }
            let child_ids: Vec<String> = level
                .iter()
                .filter(|e| e.kind == ElementKind::Collection)
                .map(|e| e.key.clone())
                .collect();
            frontier = if child_ids.is_empty() {
                Vec::new()
            } else {
                self.inner
                    .find(
                        &ItemFilter::new()
                            .with_ids(child_ids.iter().cloned())
                            .include_deleted(),
                        &SearchOptions::limit(child_ids.len()),
                    )
                    .await?
            };
            levels.insert(depth, level);
        }
        Ok(levels)
    }

    /// Every descendant element of `root`, nearest first.
    pub async fn descendants(
        &self,
        root: &Collection,
        include_deleted: bool,
        max_depth: usize,
    ) -> Result<Vec<CollectionElement>, RepositoryError> {
        Ok(self
            .descendants_by_depth(root, include_deleted, max_depth)
            .await?
            .into_values()
            .flatten()
            .collect())
    }

    /// Strip references to `ids` from every collection's deleted elements.
    pub async fn forget_deleted_elements(&self, ids: &[String]) -> Result<usize, RepositoryError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let parents = self
            .inner
            .find(
                &ItemFilter::new()
                    .containing_deleted_elements(ids.iter().cloned())
                    .include_deleted(),
                &SearchOptions::default(),
            )
            .await?;
        let forget: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut updated = Vec::with_capacity(parents.len());
        for mut parent in parents {
            parent
                .deleted_elements
                .retain(|e| !forget.contains(e.key.as_str()));
            updated.push(parent);
        }
        let count = updated.len();
        self.inner
            .bulk(&updated, &[], BulkOptions::default())
            .await?;
        Ok(count)
    }
}
