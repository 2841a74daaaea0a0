//! Repository adapter for binders.

use chrono::Utc;
use serde_json::json;
use tracing::info;

use crate::item::core::error::RepositoryError;
use crate::item::core::filter::{ItemFilter, SearchOptions};
use crate::item::core::repository::IndexedRepository;
use crate::item::entities::Binder;
use crate::store::{BulkOptions, BulkReport};

#[derive(Clone)]
pub struct BinderRepository {
    inner: IndexedRepository<Binder>,
}

impl BinderRepository {
    #[must_use]
    pub fn new(inner: IndexedRepository<Binder>) -> Self {
        Self { inner }
    }

    #[must_use]
    pub fn repository(&self) -> &IndexedRepository<Binder> {
        &self.inner
    }

    /// Fetch a binder by id, deleted or not.
    pub async fn get_binder(&self, id: &str) -> Result<Binder, RepositoryError> {
        self.inner.get(id).await
    }

    pub async fn find_binders(
        &self,
        filter: &ItemFilter,
        options: &SearchOptions,
    ) -> Result<Vec<Binder>, RepositoryError> {
        self.inner.find(filter, options).await
    }

    pub async fn create_binder(&self, mut binder: Binder) -> Result<Binder, RepositoryError> {
        binder.normalize_text_languages();
        binder.validate()?;
        let now = Utc::now();
        binder.created = Some(now);
        binder.last_modified = Some(now);
        let binder = self.inner.save(binder).await?;
        info!(binder_id = ?binder.id, account_id = %binder.account_id, "Binder created");
        Ok(binder)
    }

    pub async fn update_binder(&self, mut binder: Binder) -> Result<Binder, RepositoryError> {
        binder.normalize_text_languages();
        binder.validate()?;
        binder.last_modified = Some(Utc::now());
        self.inner.update(binder).await
    }

    pub async fn soft_delete_binder(
        &self,
        id: &str,
        deleted_by: Option<&str>,
        group: Option<&str>,
    ) -> Result<Binder, RepositoryError> {
        self.inner.soft_delete(id, deleted_by, group).await
    }

    pub async fn recover_binder(&self, id: &str) -> Result<Binder, RepositoryError> {
        self.inner.recover(id).await
    }

    /// Permanently remove a binder.
    pub async fn hard_delete_binder(&self, id: &str) -> Result<(), RepositoryError> {
        self.inner.delete(id).await?;
        info!(binder_id = id, "Binder permanently deleted");
        Ok(())
    }

    pub async fn count_binders(&self, account_id: &str) -> Result<usize, RepositoryError> {
        self.inner
            .count(&ItemFilter::new().with_account(account_id))
            .await
    }

    pub async fn binder_ids_by_account(&self, account_id: &str) -> Result<Vec<String>, RepositoryError> {
        self.inner
            .find_ids(&ItemFilter::new().with_account(account_id))
            .await
    }

    /// The subset of `ids` that exist and are not soft-deleted.
    pub async fn live_binder_ids(&self, ids: &[String]) -> Result<Vec<String>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.inner
            .find_ids(&ItemFilter::new().with_ids(ids.iter().cloned()))
            .await
    }

    pub async fn set_ancestor_ids(&self, id: &str, ancestor_ids: &[String]) -> Result<(), RepositoryError> {
        self.inner
            .patch(id, json!({ "ancestorIds": ancestor_ids }))
            .await
    }

    pub async fn bulk(
        &self,
        to_save: &[Binder],
        to_delete: &[String],
        options: BulkOptions,
    ) -> Result<BulkReport, RepositoryError> {
        self.inner.bulk(to_save, to_delete, options).await
    }
}
