//! Repository adapter for publications.

use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::info;

use crate::item::core::error::RepositoryError;
use crate::item::core::filter::SearchOptions;
use crate::item::core::repository::IndexedRepository;
use crate::item::entities::Publication;
use crate::store::{BulkOperation, BulkOptions, BulkReport, Query, Refresh, SearchRequest};

/// Filter criteria for publication lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicationFilter {
    pub binder_ids: Option<Vec<String>>,
    pub account_id: Option<String>,
    pub languages: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

impl PublicationFilter {
    #[must_use]
    pub fn for_binders<I, S>(binder_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            binder_ids: Some(binder_ids.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn active_only(mut self) -> Self {
        self.is_active = Some(true);
        self
    }

    #[must_use]
    pub fn in_languages(mut self, languages: &[String]) -> Self {
        if !languages.is_empty() {
            self.languages = Some(languages.to_vec());
        }
        self
    }

    #[must_use]
    pub fn to_query(&self) -> Query {
        let mut clauses = Vec::new();
        if let Some(binder_ids) = &self.binder_ids {
            clauses.push(Query::terms("binderId", binder_ids.iter().map(String::as_str)));
        }
        if let Some(account_id) = &self.account_id {
            clauses.push(Query::term("accountId", account_id.as_str()));
        }
        if let Some(languages) = &self.languages {
            clauses.push(Query::terms(
                "language.iso639_1",
                languages.iter().map(String::as_str),
            ));
        }
        if let Some(is_active) = self.is_active {
            clauses.push(Query::term("isActive", is_active));
        }
        if clauses.is_empty() {
            Query::MatchAll
        } else {
            Query::and(clauses)
        }
    }
}

#[derive(Clone)]
pub struct PublicationRepository {
    inner: IndexedRepository<Publication>,
}

impl PublicationRepository {
    #[must_use]
    pub fn new(inner: IndexedRepository<Publication>) -> Self {
        Self { inner }
    }

    #[must_use]
    pub fn repository(&self) -> &IndexedRepository<Publication> {
        &self.inner
    }

    pub async fn get_publication(&self, id: &str) -> Result<Publication, RepositoryError> {
        self.inner.get(id).await
    }

    pub async fn find_publications(
        &self,
        filter: &PublicationFilter,
        options: &SearchOptions,
    ) -> Result<Vec<Publication>, RepositoryError> {
        self.inner
            .search(&options.to_request(filter.to_query()))
            .await
    }

    pub async fn save_publication(&self, publication: Publication) -> Result<Publication, RepositoryError> {
        self.inner.save(publication).await
    }

    /// Merge `partial` into a stored publication.
    pub async fn patch_publication(&self, id: &str, partial: Value) -> Result<(), RepositoryError> {
        self.inner.patch(id, partial).await
    }

    pub async fn bulk(
        &self,
        to_save: &[Publication],
        to_delete: &[String],
        options: BulkOptions,
    ) -> Result<BulkReport, RepositoryError> {
        self.inner.bulk(to_save, to_delete, options).await
    }

    /// Whether any of `binder_ids` has an active publication.
    ///
    /// Only existence matters, so at most one hit is fetched.
    pub async fn has_active_publication(&self, binder_ids: &[String]) -> Result<bool, RepositoryError> {
        if binder_ids.is_empty() {
            return Ok(false);
        }
        let query = PublicationFilter::for_binders(binder_ids.iter().cloned())
            .active_only()
            .to_query();
        let hits = self
            .inner
            .search(&SearchRequest::new(query).with_size(1))
            .await?;
        Ok(!hits.is_empty())
    }

    /// Subset of `binder_ids` that have at least one active publication.
    pub async fn binders_with_active_publications(
        &self,
        binder_ids: &[String],
    ) -> Result<HashSet<String>, RepositoryError> {
        if binder_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let filter = PublicationFilter::for_binders(binder_ids.iter().cloned()).active_only();
        let publications = self
            .find_publications(&filter, &SearchOptions::default())
            .await?;
        Ok(publications.into_iter().map(|p| p.binder_id).collect())
    }

    /// Active publications of a binder, optionally restricted to languages.
    pub async fn active_publications(
        &self,
        binder_id: &str,
        languages: &[String],
    ) -> Result<Vec<Publication>, RepositoryError> {
        let filter = PublicationFilter::for_binders([binder_id])
            .active_only()
            .in_languages(languages);
        self.find_publications(&filter, &SearchOptions::default())
            .await
    }

    /// Mark publications inactive.
    pub async fn deactivate(&self, ids: &[String]) -> Result<BulkReport, RepositoryError> {
        let unpublished = Utc::now();
        let operations: Vec<BulkOperation> = ids
            .iter()
            .map(|id| BulkOperation::Update {
                id: id.clone(),
                partial: json!({ "isActive": false, "unpublishDate": unpublished }),
            })
            .collect();
        let report = self
            .inner
            .bulk_operations(
                &operations,
                BulkOptions {
                    ignore_duplicates: false,
                    refresh: Refresh::WaitFor,
                },
            )
            .await?;
        info!(count = ids.len(), "Publications deactivated");
        Ok(report)
    }

    /// Copy a binder's ancestor ids onto all of its publications.
    pub async fn set_ancestor_ids_for_binder(
        &self,
        binder_id: &str,
        ancestor_ids: &[String],
    ) -> Result<BulkReport, RepositoryError> {
        let ids = self
            .inner
            .search(&SearchRequest::new(PublicationFilter::for_binders([binder_id]).to_query()))
            .await?
            .into_iter()
            .filter_map(|p| p.id)
            .collect::<Vec<_>>();
        let operations: Vec<BulkOperation> = ids
            .into_iter()
            .map(|id| BulkOperation::Update {
                id,
                partial: json!({ "ancestorIds": ancestor_ids }),
            })
            .collect();
        self.inner
            .bulk_operations(&operations, BulkOptions::default())
            .await
    }

    /// Permanently remove every publication of the given binders.
    pub async fn delete_for_binders(&self, binder_ids: &[String]) -> Result<BulkReport, RepositoryError> {
        if binder_ids.is_empty() {
            return Ok(BulkReport::default());
        }
        let query = PublicationFilter::for_binders(binder_ids.iter().cloned()).to_query();
        let ids = self.inner.search(&SearchRequest::new(query)).await?;
        let operations: Vec<BulkOperation> = ids
            .into_iter()
            .filter_map(|p| p.id)
            .map(|id| BulkOperation::Delete { id })
            .collect();
        self.inner
            .bulk_operations(&operations, BulkOptions::default())
            .await
    }
}
