//! Permanent removal of items whose soft deletion has outlived retention.

use chrono::Utc;
use std::time::Duration;
use tracing::info;

use crate::item::core::error::RepositoryError;
use crate::item::repositories::Repositories;
use crate::store::BulkOptions;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub binders: usize,
    pub collections: usize,
    pub publications: usize,
    /// Parent collections whose deleted-element lists were cleaned up.
    pub parents_cleaned: usize,
}

/// Permanently delete binders and collections soft-deleted longer ago than
/// `retention`, together with publications of purged binders.
pub async fn purge_expired(
    repos: &Repositories,
    retention: Duration,
) -> Result<PurgeReport, RepositoryError> {
    let retention = chrono::Duration::from_std(retention)
        .map_err(|e| RepositoryError::invalid(format!("retention out of range: {e}")))?;
    let cutoff = Utc::now()
        .checked_sub_signed(retention)
        .ok_or_else(|| RepositoryError::invalid("retention reaches before the epoch"))?;

    let binder_ids = repos.binders.repository().items_to_purge(cutoff).await?;
    let collection_ids = repos
        .collections
        .repository()
        .items_to_purge(cutoff)
        .await?;

    let publications = repos.publications.delete_for_binders(&binder_ids).await?;
    repos
        .binders
        .bulk(&[], &binder_ids, BulkOptions::default())
        .await?;
    repos
        .collections
        .repository()
        .bulk(&[], &collection_ids, BulkOptions::default())
        .await?;

    let purged: Vec<String> = binder_ids
        .iter()
        .chain(collection_ids.iter())
        .cloned()
        .collect();
    let parents_cleaned = repos.collections.forget_deleted_elements(&purged).await?;

    let report = PurgeReport {
        binders: binder_ids.len(),
        collections: collection_ids.len(),
        publications: publications.succeeded,
        parents_cleaned,
    };
    info!(
        cutoff = %cutoff,
        binders = report.binders,
        collections = report.collections,
        publications = report.publications,
        "Purged expired soft-deleted items"
    );
    Ok(report)
}
