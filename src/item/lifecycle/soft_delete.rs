//! Soft delete and recovery for items that support it.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::item::core::error::RepositoryError;
use crate::item::core::filter::ItemFilter;
use crate::item::core::repository::{IndexedRepository, StoredItem};
use crate::store::Query;

/// Items that can be marked deleted without being removed from storage.
///
/// A soft-deleted item carries a deletion time and is excluded from normal
/// lookups until it is recovered or purged.
pub trait SoftDeletable: StoredItem {
    fn deletion_time(&self) -> Option<DateTime<Utc>>;

    fn mark_deleted(&mut self, at: DateTime<Utc>, deleted_by: Option<&str>, group: Option<&str>);

    fn clear_deletion(&mut self);

    fn is_deleted(&self) -> bool {
        self.deletion_time().is_some()
    }
}

impl<T: SoftDeletable> IndexedRepository<T> {
    /// Mark an item deleted. Deleting an already deleted item is a no-op.
    ///
    /// `group` records the collection whose deletion took this item with it.
    pub async fn soft_delete(
        &self,
        id: &str,
        deleted_by: Option<&str>,
        group: Option<&str>,
    ) -> Result<T, RepositoryError> {
        let kind = T::KIND;
        let mut item = self.get(id).await?;
        if item.is_deleted() {
            debug!(kind = %kind, id, "Item already soft-deleted");
            return Ok(item);
        }
        item.mark_deleted(Utc::now(), deleted_by, group);
        let item = self.save(item).await?;
        info!(kind = %kind, id, deleted_by = ?deleted_by, "Item soft-deleted");
        Ok(item)
    }

    /// Clear an item's deletion marker. Recovering a live item is a no-op.
    pub async fn recover(&self, id: &str) -> Result<T, RepositoryError> {
        let kind = T::KIND;
        let mut item = self.get(id).await?;
        if !item.is_deleted() {
            debug!(kind = %kind, id, "Item is not deleted; nothing to recover");
            return Ok(item);
        }
        item.clear_deletion();
        let item = self.save(item).await?;
        info!(kind = %kind, id, "Item recovered");
        Ok(item)
    }

    /// Ids of items soft-deleted at or before `cutoff`.
    pub async fn items_to_purge(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>, RepositoryError> {
        let filter = ItemFilter::new()
            .only_deleted()
            .matching(Query::lte("deletionTime", cutoff.to_rfc3339()));
        self.find_ids(&filter).await
    }
}
