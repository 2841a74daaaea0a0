//! Maintains the `hasPublications` flag on collections.
//!
//! A collection has publications when one of its live elements is a document
//! with an active publication, or a live child collection that itself has the
//! flag. Changes propagate in both directions:
//!
//! - **Bubble up**: when a collection turns true, every ancestor that is still
//!   false is set true, stopping on branches that already are.
//! - **Bubble down**: when a collection turns false, only parents that are
//!   currently true are re-resolved, since a false parent cannot lose a flag
//!   it does not have.
//!
//! Walks are bounded by a maximum depth so a corrupted (cyclic) tree fails
//! with [`RepositoryError::DepthExceeded`] instead of looping.

use std::collections::HashSet;
use tracing::{debug, info};

use crate::item::entities::Collection;
use crate::item::repositories::{
    BinderRepository, CollectionRepository, PublicationRepository, Repositories,
};
use crate::item::{ItemFilter, RepositoryError};

/// Result of resolving every collection until nothing changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvergenceReport {
    pub passes: usize,
    pub collections: usize,
    pub changed: usize,
}

#[derive(Clone)]
pub struct HasPublicationsResolver {
    binders: BinderRepository,
    collections: CollectionRepository,
    publications: PublicationRepository,
    max_depth: usize,
}

impl HasPublicationsResolver {
    #[must_use]
    pub fn new(repos: &Repositories, max_depth: usize) -> Self {
        Self {
            binders: repos.binders.clone(),
            collections: repos.collections.clone(),
            publications: repos.publications.clone(),
            max_depth,
        }
    }

    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Compute the flag `collection` should carry from its live elements.
    ///
    /// Documents and child collections that are soft-deleted themselves do
    /// not count, even while still referenced from `elements`.
    pub async fn compute_flag(&self, collection: &Collection) -> Result<bool, RepositoryError> {
        let (documents, child_collections) = collection.partition_elements();
        let documents = self.binders.live_binder_ids(&documents).await?;
        if self.publications.has_active_publication(&documents).await? {
            return Ok(true);
        }
        let children = self.collections.find_by_ids(&child_collections).await?;
        Ok(children.iter().any(|child| child.has_publications))
    }

    /// Recompute and persist a collection's flag, propagating any change.
    ///
    /// `collection` is compared as given: a stale copy whose flag differs
    /// from the computed value is written and propagated.
    pub async fn resolve_collection(&self, collection: &Collection) -> Result<bool, RepositoryError> {
        self.resolve_at_depth(collection.clone(), 0).await
    }

    pub async fn resolve_collection_by_id(&self, id: &str) -> Result<bool, RepositoryError> {
        let collection = self.collections.get_collection(id).await?;
        self.resolve_at_depth(collection, 0).await
    }

    async fn resolve_at_depth(&self, collection: Collection, depth: usize) -> Result<bool, RepositoryError> {
        if depth > self.max_depth {
            return Err(RepositoryError::DepthExceeded(self.max_depth));
        }
        let Some(id) = collection.id.clone() else {
            return Err(RepositoryError::invalid("cannot resolve a collection without an id"));
        };

        let computed = self.compute_flag(&collection).await?;
        if computed == collection.has_publications {
            debug!(collection_id = %id, has_publications = computed, "Publication flag unchanged");
            return Ok(computed);
        }

        self.collections
            .multiset_flag(std::slice::from_ref(&id), computed)
            .await?;
        info!(collection_id = %id, has_publications = computed, depth, "Publication flag changed");

        if computed {
            self.bubble_up(&id).await?;
        } else {
            let parents = self.collections.find_parents_with_flag(&id, true).await?;
            for parent in parents {
                Box::pin(self.resolve_at_depth(parent, depth.saturating_add(1))).await?;
            }
        }
        Ok(computed)
    }

    /// Set the flag on every ancestor of `item_id` that does not carry it yet.
    ///
    /// Returns the number of collections flipped to true.
    pub async fn mark_ancestors_published(&self, item_id: &str) -> Result<usize, RepositoryError> {
        self.bubble_up(item_id).await
    }

    async fn bubble_up(&self, item_id: &str) -> Result<usize, RepositoryError> {
        let mut visited: HashSet<String> = HashSet::from([item_id.to_string()]);
        let mut frontier = vec![item_id.to_string()];
        let mut flipped: usize = 0;
        let mut depth: usize = 0;
        loop {
            let parents = self.collections.find_parents(&frontier).await?;
            let to_flip: Vec<String> = parents
                .into_iter()
                .filter(|parent| !parent.has_publications)
                .filter_map(|parent| parent.id)
                .filter(|id| visited.insert(id.clone()))
                .collect();
            if to_flip.is_empty() {
                break;
            }
            depth = depth.saturating_add(1);
            if depth > self.max_depth {
                return Err(RepositoryError::DepthExceeded(self.max_depth));
            }
            self.collections.multiset_flag(&to_flip, true).await?;
            flipped = flipped.saturating_add(to_flip.len());
            debug!(from = item_id, level = depth, collections = ?to_flip, "Bubbled publication flag up");
            frontier = to_flip;
        }
        Ok(flipped)
    }

    /// Re-resolve every live parent of `item_id`.
    ///
    /// Used after an element lost or gained publications without the caller
    /// knowing which way the parents' flags will go.
    pub async fn resolve_parents(&self, item_id: &str) -> Result<(), RepositoryError> {
        let parents = self
            .collections
            .find_parents(std::slice::from_ref(&item_id.to_string()))
            .await?;
        for parent in parents {
            self.resolve_at_depth(parent, 0).await?;
        }
        Ok(())
    }

    /// Resolve every live collection repeatedly until a pass changes nothing.
    pub async fn resolve_all(&self) -> Result<ConvergenceReport, RepositoryError> {
        let ids = self
            .collections
            .repository()
            .find_ids(&ItemFilter::new())
            .await?;
        let mut report = ConvergenceReport {
            collections: ids.len(),
            ..ConvergenceReport::default()
        };
        let max_passes = self.max_depth.saturating_add(2);
        loop {
            report.passes = report.passes.saturating_add(1);
            let mut changed: usize = 0;
            for id in &ids {
                let collection = self.collections.get_collection(id).await?;
                let before = collection.has_publications;
                if self.resolve_at_depth(collection, 0).await? != before {
                    changed = changed.saturating_add(1);
                }
            }
            report.changed = report.changed.saturating_add(changed);
            if changed == 0 {
                break;
            }
            if report.passes >= max_passes {
                return Err(RepositoryError::DepthExceeded(self.max_depth));
            }
        }
        info!(
            passes = report.passes,
            collections = report.collections,
            changed = report.changed,
            "Publication flags converged"
        );
        Ok(report)
    }
}
