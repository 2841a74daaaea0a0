//! Structural edits of the collection tree.
//!
//! Every edit that can change which documents are reachable below a
//! collection ends by re-resolving the affected publication flags, and every
//! edit that moves an item refreshes the stored ancestor ids of the moved
//! subtree.

mod ancestors;

pub use ancestors::collect_ancestor_ids;

use chrono::Utc;
use std::collections::HashSet;
use tracing::{info, warn};

use crate::item::entities::{Collection, CollectionElement, ElementKind, Publication};
use crate::item::lifecycle::SoftDeletable;
use crate::item::repositories::{AnyItem, Repositories};
use crate::item::{ItemFilter, RepositoryError, SearchOptions};
use crate::publication_flags::HasPublicationsResolver;
use crate::store::Query;

#[derive(Clone)]
pub struct TreeOperations {
    repos: Repositories,
    resolver: HasPublicationsResolver,
    max_depth: usize,
}

impl TreeOperations {
    #[must_use]
    pub fn new(repos: &Repositories, max_depth: usize) -> Self {
        Self {
            repos: repos.clone(),
            resolver: HasPublicationsResolver::new(repos, max_depth),
            max_depth,
        }
    }

    #[must_use]
    pub fn resolver(&self) -> &HasPublicationsResolver {
        &self.resolver
    }

    /// Append `element` to a collection.
    ///
    /// Rejects elements already present, soft-deleted items and collection
    /// elements that would make the collection its own ancestor.
    pub async fn add_element(
        &self,
        collection_id: &str,
        element: CollectionElement,
    ) -> Result<Collection, RepositoryError> {
        let mut collection = self.repos.collections.get_collection(collection_id).await?;
        if collection.has_element(&element.key) {
            return Err(RepositoryError::invalid(format!(
                "{} is already an element of collection {collection_id}",
                element.key
            )));
        }

        let published = match element.kind {
            ElementKind::Collection => {
                self.ensure_no_cycle(collection_id, &element.key).await?;
                let child = self.repos.collections.get_collection(&element.key).await?;
                if child.is_deleted() {
                    return Err(RepositoryError::invalid(format!(
                        "collection {} is deleted",
                        element.key
                    )));
                }
                child.has_publications
            }
            ElementKind::Document => {
                if self.repos.binders.get_binder(&element.key).await?.is_deleted() {
                    return Err(RepositoryError::invalid(format!(
                        "binder {} is deleted",
                        element.key
                    )));
                }
                self.repos
                    .publications
                    .has_active_publication(std::slice::from_ref(&element.key))
                    .await?
            }
        };

        collection.deleted_elements.retain(|e| e.key != element.key);
        collection.elements.push(element.clone());
        let collection = self.repos.collections.update_collection(collection).await?;
        info!(collection_id, element = %element.key, kind = ?element.kind, "Element added");

        if published {
            self.resolver.resolve_collection(&collection).await?;
        }
        self.refresh_ancestor_ids(&element).await?;
        self.repos.collections.get_collection(collection_id).await
    }

    async fn ensure_no_cycle(&self, parent_id: &str, child_id: &str) -> Result<(), RepositoryError> {
        let circular = || RepositoryError::CircularPath {
            parent: parent_id.to_string(),
            child: child_id.to_string(),
        };
        if parent_id == child_id {
            return Err(circular());
        }
        let ancestors =
            collect_ancestor_ids(&self.repos.collections, parent_id, self.max_depth).await?;
        if ancestors.iter().any(|id| id == child_id) {
            return Err(circular());
        }
        Ok(())
    }

    /// Remove an element from a collection and re-resolve its flag.
    pub async fn remove_element(&self, collection_id: &str, key: &str) -> Result<Collection, RepositoryError> {
        let mut collection = self.repos.collections.get_collection(collection_id).await?;
        let removed = collection
            .elements
            .iter()
            .chain(collection.deleted_elements.iter())
            .find(|e| e.key == key)
            .cloned();
        let Some(removed) = removed else {
            return Err(RepositoryError::not_found(format!(
                "{key} in collection {collection_id}"
            )));
        };
        collection.remove_element(key);
        let collection = self.repos.collections.update_collection(collection).await?;
        info!(collection_id, element = key, "Element removed");

        self.resolver.resolve_collection(&collection).await?;
        self.refresh_ancestor_ids(&removed).await?;
        self.repos.collections.get_collection(collection_id).await
    }

    /// Publish one language of a binder, replacing its active publication.
    pub async fn publish(
        &self,
        binder_id: &str,
        language_code: &str,
        published_by: Option<&str>,
    ) -> Result<Publication, RepositoryError> {
        let binder = self.repos.binders.get_binder(binder_id).await?;
        if binder.is_deleted() {
            return Err(RepositoryError::invalid(format!(
                "binder {binder_id} is deleted"
            )));
        }
        let Some(language) = binder
            .languages
            .iter()
            .find(|l| l.iso639_1 == language_code)
            .cloned()
        else {
            return Err(RepositoryError::invalid(format!(
                "binder {binder_id} has no language {language_code}"
            )));
        };

        let previous: Vec<String> = self
            .repos
            .publications
            .active_publications(binder_id, &[language_code.to_string()])
            .await?
            .into_iter()
            .filter_map(|p| p.id)
            .collect();
        if !previous.is_empty() {
            self.repos.publications.deactivate(&previous).await?;
        }

        let mut publication = Publication::from_binder(binder_id, &binder, language);
        publication.is_active = true;
        publication.published_by = published_by.map(str::to_string);
        let publication = self.repos.publications.save_publication(publication).await?;
        info!(binder_id, language = language_code, publication_id = ?publication.id, "Binder published");

        self.resolver.mark_ancestors_published(binder_id).await?;
        Ok(publication)
    }

    /// Deactivate a binder's publications in `languages` (all when empty).
    ///
    /// Returns how many publications were deactivated.
    pub async fn unpublish(&self, binder_id: &str, languages: &[String]) -> Result<usize, RepositoryError> {
        let ids: Vec<String> = self
            .repos
            .publications
            .active_publications(binder_id, languages)
            .await?
            .into_iter()
            .filter_map(|p| p.id)
            .collect();
        if ids.is_empty() {
            return Ok(0);
        }
        self.repos.publications.deactivate(&ids).await?;
        info!(binder_id, count = ids.len(), "Binder unpublished");
        self.resolver.resolve_parents(binder_id).await?;
        Ok(ids.len())
    }

    /// Soft-delete a binder or collection and detach it from its parents.
    ///
    /// Deleting a collection also soft-deletes its live descendants as one
    /// group so they come back together on recovery. Published binders
    /// cannot be deleted, directly or as part of a group.
    pub async fn soft_delete_item(&self, item_id: &str, deleted_by: Option<&str>) -> Result<AnyItem, RepositoryError> {
        let item = match self.repos.find_item(item_id).await? {
            AnyItem::Document(_) => {
                self.ensure_unpublished(&[item_id.to_string()]).await?;
                AnyItem::Document(
                    self.repos
                        .binders
                        .soft_delete_binder(item_id, deleted_by, None)
                        .await?,
                )
            }
            AnyItem::Collection(collection) => {
                let descendants = self
                    .repos
                    .collections
                    .descendants(&collection, false, self.max_depth)
                    .await?;
                let documents: Vec<String> = descendants
                    .iter()
                    .filter(|e| e.kind == ElementKind::Document)
                    .map(|e| e.key.clone())
                    .collect();
                self.ensure_unpublished(&documents).await?;
                let deleted = self
                    .repos
                    .collections
                    .soft_delete_collection(item_id, deleted_by, None)
                    .await?;
                for element in descendants {
                    self.soft_delete_in_group(&element, deleted_by, item_id).await?;
                }
                AnyItem::Collection(deleted)
            }
            other => {
                return Err(RepositoryError::invalid(format!(
                    "cannot soft-delete {} {item_id}",
                    other.kind()
                )))
            }
        };

        self.detach_from_parents(item_id).await?;
        Ok(item)
    }

    async fn ensure_unpublished(&self, binder_ids: &[String]) -> Result<(), RepositoryError> {
        let published = self
            .repos
            .publications
            .binders_with_active_publications(binder_ids)
            .await?;
        match binder_ids.iter().find(|id| published.contains(*id)) {
            Some(id) => Err(RepositoryError::BinderHasPublications(id.clone())),
            None => Ok(()),
        }
    }

    /// Move `item_id` to the deleted elements of every live parent.
    async fn detach_from_parents(&self, item_id: &str) -> Result<(), RepositoryError> {
        let parents = self
            .repos
            .collections
            .find_parents(std::slice::from_ref(&item_id.to_string()))
            .await?;
        for mut parent in parents {
            parent.move_to_deleted(item_id);
            let parent = self.repos.collections.update_collection(parent).await?;
            self.resolver.resolve_collection(&parent).await?;
        }
        Ok(())
    }

    /// Move `item_id` back from the deleted elements of every live parent.
    async fn reattach_to_parents(&self, item_id: &str) -> Result<(), RepositoryError> {
        let parents = self
            .repos
            .collections
            .find_parents_of_deleted(item_id)
            .await?;
        for mut parent in parents {
            parent.restore_from_deleted(item_id);
            let parent = self.repos.collections.update_collection(parent).await?;
            self.resolver.resolve_collection(&parent).await?;
        }
        Ok(())
    }

    async fn soft_delete_in_group(
        &self,
        element: &CollectionElement,
        deleted_by: Option<&str>,
        group: &str,
    ) -> Result<(), RepositoryError> {
        let result = match element.kind {
            ElementKind::Document => self
                .repos
                .binders
                .soft_delete_binder(&element.key, deleted_by, Some(group))
                .await
                .map(|_| ()),
            ElementKind::Collection => self
                .repos
                .collections
                .soft_delete_collection(&element.key, deleted_by, Some(group))
                .await
                .map(|_| ()),
        };
        match result {
            // Parents inside the group are already deleted; this reaches
            // the ones outside it.
            Ok(()) => self.detach_from_parents(&element.key).await,
            Err(RepositoryError::NotFound(id)) => {
                warn!(group, element = %id, "Dangling element skipped during group delete");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Recover a soft-deleted binder or collection and reattach it.
    pub async fn recover_item(&self, item_id: &str) -> Result<AnyItem, RepositoryError> {
        let item = match self.repos.find_item(item_id).await? {
            AnyItem::Document(_) => {
                AnyItem::Document(self.repos.binders.recover_binder(item_id).await?)
            }
            AnyItem::Collection(_) => {
                let recovered = self.repos.collections.recover_collection(item_id).await?;
                self.recover_group(item_id).await?;
                AnyItem::Collection(recovered)
            }
            other => {
                return Err(RepositoryError::invalid(format!(
                    "cannot recover {} {item_id}",
                    other.kind()
                )))
            }
        };

        self.reattach_to_parents(item_id).await?;
        Ok(item)
    }

    async fn recover_group(&self, group: &str) -> Result<(), RepositoryError> {
        let filter = ItemFilter::new()
            .only_deleted()
            .matching(Query::term("deletedGroupCollectionId", group));
        let binder_ids = self.repos.binders.repository().find_ids(&filter).await?;
        for id in &binder_ids {
            self.repos.binders.recover_binder(id).await?;
        }
        let collection_ids = self.repos.collections.repository().find_ids(&filter).await?;
        for id in &collection_ids {
            self.repos.collections.recover_collection(id).await?;
        }
        for id in binder_ids.iter().chain(&collection_ids) {
            self.reattach_to_parents(id).await?;
        }
        Ok(())
    }

    /// Permanently delete a binder or collection and detach it everywhere.
    ///
    /// A binder must be unpublished first and takes its inactive
    /// publications with it. A binder deleted as part of a collection group
    /// is only removed when `allow_group_deletion` is set. Children of a
    /// deleted collection are kept and get their ancestor ids recomputed.
    pub async fn delete_item_permanently(
        &self,
        item_id: &str,
        allow_group_deletion: bool,
    ) -> Result<(), RepositoryError> {
        let orphans = match self.repos.find_item(item_id).await? {
            AnyItem::Document(binder) => {
                if let Some(group) = binder
                    .deleted_group_collection_id
                    .filter(|_| !allow_group_deletion)
                {
                    return Err(RepositoryError::DeletedGroupMember {
                        binder: item_id.to_string(),
                        group,
                    });
                }
                self.ensure_unpublished(&[item_id.to_string()]).await?;
                self.repos
                    .publications
                    .delete_for_binders(std::slice::from_ref(&item_id.to_string()))
                    .await?;
                self.repos.binders.hard_delete_binder(item_id).await?;
                Vec::new()
            }
            AnyItem::Collection(collection) => {
                self.repos.collections.hard_delete_collection(item_id).await?;
                collection.elements
            }
            other => {
                return Err(RepositoryError::invalid(format!(
                    "cannot delete {} {item_id}",
                    other.kind()
                )))
            }
        };

        // Deleted parents are included so no dangling reference survives.
        let mut parents = self
            .repos
            .collections
            .find_collections(
                &ItemFilter::new().containing_elements([item_id]).include_deleted(),
                &SearchOptions::default(),
            )
            .await?;
        parents.extend(
            self.repos
                .collections
                .find_collections(
                    &ItemFilter::new()
                        .containing_deleted_elements([item_id])
                        .include_deleted(),
                    &SearchOptions::default(),
                )
                .await?,
        );
        let mut seen = HashSet::new();
        for mut parent in parents {
            let fresh = parent.id.clone().is_some_and(|id| seen.insert(id));
            if !fresh || !parent.remove_element(item_id) {
                continue;
            }
            let parent = self.repos.collections.update_collection(parent).await?;
            self.resolver.resolve_collection(&parent).await?;
        }
        for orphan in &orphans {
            self.refresh_ancestor_ids(orphan).await?;
        }
        info!(item_id, orphans = orphans.len(), "Item permanently deleted");
        Ok(())
    }

    /// Recompute and store ancestor ids for `element` and everything below it.
    pub async fn refresh_ancestor_ids(&self, element: &CollectionElement) -> Result<usize, RepositoryError> {
        let mut subtree = vec![element.clone()];
        if element.kind == ElementKind::Collection {
            match self.repos.collections.get_collection(&element.key).await {
                Ok(collection) => subtree.extend(
                    self.repos
                        .collections
                        .descendants(&collection, true, self.max_depth)
                        .await?,
                ),
                Err(RepositoryError::NotFound(_)) => return Ok(0),
                Err(e) => return Err(e),
            }
        }
        let mut refreshed: usize = 0;
        for item in &subtree {
            let ancestors =
                collect_ancestor_ids(&self.repos.collections, &item.key, self.max_depth).await?;
            let outcome = match item.kind {
                ElementKind::Document => {
                    match self.repos.binders.set_ancestor_ids(&item.key, &ancestors).await {
                        Ok(()) => self
                            .repos
                            .publications
                            .set_ancestor_ids_for_binder(&item.key, &ancestors)
                            .await
                            .map(|_| ()),
                        Err(e) => Err(e),
                    }
                }
                ElementKind::Collection => {
                    self.repos
                        .collections
                        .set_ancestor_ids(&item.key, &ancestors)
                        .await
                }
            };
            match outcome {
                Ok(()) => refreshed = refreshed.saturating_add(1),
                Err(RepositoryError::NotFound(id)) => {
                    warn!(element = %id, "Skipping ancestor refresh of missing item");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(refreshed)
    }

    /// Recompute ancestor ids of every binder and collection.
    pub async fn populate_ancestor_ids(&self) -> Result<usize, RepositoryError> {
        let all = ItemFilter::new().include_deleted();
        let binder_ids = self.repos.binders.repository().find_ids(&all).await?;
        let collection_ids = self.repos.collections.repository().find_ids(&all).await?;
        let mut refreshed: usize = 0;
        let elements = binder_ids
            .into_iter()
            .map(CollectionElement::document)
            .chain(collection_ids.into_iter().map(CollectionElement::collection));
        for element in elements {
            let ancestors =
                collect_ancestor_ids(&self.repos.collections, &element.key, self.max_depth)
                    .await?;
            match element.kind {
                ElementKind::Document => {
                    self.repos
                        .binders
                        .set_ancestor_ids(&element.key, &ancestors)
                        .await?;
                    self.repos
                        .publications
                        .set_ancestor_ids_for_binder(&element.key, &ancestors)
                        .await?;
                }
                ElementKind::Collection => {
                    self.repos
                        .collections
                        .set_ancestor_ids(&element.key, &ancestors)
                        .await?;
                }
            }
            refreshed = refreshed.saturating_add(1);
        }
        info!(items = refreshed, at = %Utc::now(), "Ancestor ids populated");
        Ok(refreshed)
    }
}
