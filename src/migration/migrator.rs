//! Scroll-transform-write pipeline.

use futures::future::try_join_all;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::types::{MigrationError, MigrationReport, TransformedDocument};
use crate::store::{
    BulkOperation, BulkReport, DocumentStore, Hit, Refresh, RetryPolicy, ScrollCursor,
    ScrollSettings, SearchRequest,
};

/// Where a migration reads from.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceQuery {
    pub index: String,
    pub request: SearchRequest,
}

impl SourceQuery {
    /// Every document of `index`.
    #[must_use]
    pub fn all(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            request: SearchRequest::match_all(),
        }
    }
}

/// Handle that asks running migrations to stop after their current page.
#[derive(Clone)]
pub struct MigrationAbort {
    sender: Arc<watch::Sender<bool>>,
}

impl Default for MigrationAbort {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationAbort {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn abort(&self) {
        self.sender.send_replace(true);
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        *self.sender.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

/// Runs migrations against one document store.
///
/// Pages are processed strictly in cursor order: the transforms of a page run
/// concurrently, then the whole page is written in a single bulk call before
/// the next page is requested.
#[derive(Clone)]
pub struct Migrator {
    store: Arc<dyn DocumentStore>,
    scroll: ScrollSettings,
    retry: RetryPolicy,
    abort: Option<watch::Receiver<bool>>,
}

impl Migrator {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, scroll: ScrollSettings, retry: RetryPolicy) -> Self {
        Self {
            store,
            scroll,
            retry,
            abort: None,
        }
    }

    #[must_use]
    pub fn with_abort(mut self, abort: &MigrationAbort) -> Self {
        self.abort = Some(abort.subscribe());
        self
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    #[must_use]
    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    fn abort_requested(&self) -> bool {
        self.abort.as_ref().is_some_and(|receiver| *receiver.borrow())
    }

    /// Copy every document matched by `source` into `target_index` through
    /// `transform`.
    ///
    /// With `overwrite` documents are upserted by id. Without it writes are
    /// create-only: ids already present in the target are counted as
    /// duplicates and left untouched. A transform returning `None` skips the
    /// record. Transform errors and cursor expiry end the run with an error;
    /// per-record write failures are collected in the report.
    pub async fn migrate<F, Fut>(
        &self,
        source: &SourceQuery,
        transform: F,
        target_index: &str,
        overwrite: bool,
    ) -> Result<MigrationReport, MigrationError>
    where
        F: Fn(Hit) -> Fut,
        Fut: Future<Output = Result<Option<TransformedDocument>, MigrationError>>,
    {
        info!(
            source = %source.index,
            target = target_index,
            overwrite,
            "Starting migration"
        );
        let mut cursor = ScrollCursor::open(
            Arc::clone(&self.store),
            &source.index,
            &source.request,
            &self.scroll,
            self.retry.clone(),
        )
        .await?;
        let mut report = MigrationReport::default();
        let outcome = loop {
            if self.abort_requested() {
                report.aborted = true;
                warn!(source = %source.index, pages = report.pages, "Migration aborted");
                break Ok(());
            }
            let page = match cursor.next_page().await {
                Ok(Some(page)) => page,
                Ok(None) => break Ok(()),
                Err(e) => break Err(MigrationError::from(e)),
            };
            if let Err(e) = self
                .migrate_page(page, &transform, target_index, overwrite, &mut report)
                .await
            {
                break Err(e);
            }
        };
        cursor.close().await;
        outcome?;

        info!(
            source = %source.index,
            target = target_index,
            read = report.read,
            written = report.written,
            skipped = report.skipped,
            duplicates = report.duplicates,
            failed = report.failures.len(),
            "Migration finished"
        );
        Ok(report)
    }

    async fn migrate_page<F, Fut>(
        &self,
        page: Vec<Hit>,
        transform: &F,
        target_index: &str,
        overwrite: bool,
        report: &mut MigrationReport,
    ) -> Result<(), MigrationError>
    where
        F: Fn(Hit) -> Fut,
        Fut: Future<Output = Result<Option<TransformedDocument>, MigrationError>>,
    {
        let read = page.len();
        report.pages = report.pages.saturating_add(1);
        report.read = report.read.saturating_add(read);

        let documents: Vec<TransformedDocument> = try_join_all(page.into_iter().map(transform))
            .await?
            .into_iter()
            .flatten()
            .collect();
        report.skipped = report
            .skipped
            .saturating_add(read.saturating_sub(documents.len()));
        if documents.is_empty() {
            return Ok(());
        }

        let operations: Vec<BulkOperation> = documents
            .into_iter()
            .map(|doc| match doc.id {
                Some(id) if !overwrite => BulkOperation::Create {
                    id,
                    document: doc.data,
                },
                id => BulkOperation::Index {
                    id,
                    document: doc.data,
                },
            })
            .collect();
        let store = self.store.as_ref();
        let ops = operations.as_slice();
        let response = self
            .retry
            .run("bulk", move || store.bulk(target_index, ops, Refresh::None))
            .await?;

        let page_report = BulkReport::from_response(&response, !overwrite);
        if !page_report.failures.is_empty() {
            warn!(
                target = target_index,
                failed = page_report.failures.len(),
                "Some records of a migration page were not written"
            );
        }
        debug!(
            target = target_index,
            page = report.pages,
            written = page_report.succeeded,
            "Migration page written"
        );
        report.written = report.written.saturating_add(page_report.succeeded);
        report.duplicates = report.duplicates.saturating_add(page_report.duplicates);
        report.failures.extend(page_report.failures);
        Ok(())
    }
}
