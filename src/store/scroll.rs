//! Scroll cursors for reading large result sets page by page.

use super::{DocumentStore, Hit, RetryPolicy, SearchRequest, StoreError};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default number of documents per scroll page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Default keep-alive of an idle cursor.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollSettings {
    pub page_size: usize,
    pub keep_alive: Duration,
}

impl Default for ScrollSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            keep_alive: DEFAULT_KEEP_ALIVE,
        }
    }
}

/// Whether a scan should keep reading pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanControl {
    Continue,
    Stop,
}

/// One page returned by a scroll call.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollPage {
    pub scroll_id: String,
    pub hits: Vec<Hit>,
    /// Total matching documents at the time the cursor was opened.
    pub total: usize,
}

/// A server-side cursor over a query's results.
///
/// Pages arrive in order. Advancing renews the cursor's keep-alive; a cursor
/// idle for longer than its keep-alive fails with
/// [`StoreError::CursorExpired`]. Call [`ScrollCursor::close`] when done.
pub struct ScrollCursor {
    store: Arc<dyn DocumentStore>,
    retry: RetryPolicy,
    index: String,
    keep_alive: Duration,
    scroll_id: Option<String>,
    first_page: Option<Vec<Hit>>,
    total: usize,
    seen: usize,
}

impl ScrollCursor {
    pub async fn open(
        store: Arc<dyn DocumentStore>,
        index: &str,
        request: &SearchRequest,
        settings: &ScrollSettings,
        retry: RetryPolicy,
    ) -> Result<Self, StoreError> {
        let page = {
            let store = store.as_ref();
            retry
                .run("open_scroll", move || {
                    store.open_scroll(index, request, settings)
                })
                .await?
        };
        debug!(index, total = page.total, "Opened scroll cursor");
        Ok(Self {
            store,
            retry,
            index: index.to_string(),
            keep_alive: settings.keep_alive,
            scroll_id: Some(page.scroll_id),
            first_page: Some(page.hits),
            total: page.total,
            seen: 0,
        })
    }

    /// Fetch the next page, or `None` once the cursor is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Vec<Hit>>, StoreError> {
        let hits = if let Some(first) = self.first_page.take() {
            first
        } else {
            let Some(scroll_id) = self.scroll_id.clone() else {
                return Ok(None);
            };
            let store = self.store.as_ref();
            let keep_alive = self.keep_alive;
            let id = scroll_id.as_str();
            let page = self
                .retry
                .run("next_scroll", move || store.next_scroll(id, keep_alive))
                .await?;
            self.scroll_id = Some(page.scroll_id);
            page.hits
        };

        if hits.is_empty() {
            return Ok(None);
        }
        self.seen = self.seen.saturating_add(hits.len());
        debug!(index = %self.index, seen = self.seen, total = self.total, "Scroll page");
        Ok(Some(hits))
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    #[must_use]
    pub fn seen(&self) -> usize {
        self.seen
    }

    /// Release the server-side cursor. Failures are logged, not returned.
    pub async fn close(mut self) {
        if let Some(scroll_id) = self.scroll_id.take() {
            if let Err(e) = self.store.clear_scroll(&scroll_id).await {
                warn!(index = %self.index, error = %e, "Failed to clear scroll cursor");
            }
        }
    }
}

/// Feed every hit matching `request` to `handler`, one page at a time.
///
/// Pages are handed over strictly in cursor order and the next page is only
/// requested after the handler finished the previous one. The cursor is
/// cleared whether the scan completes, stops early or fails. Returns the
/// number of hits handed to the handler.
pub async fn scan<F, Fut, E>(
    store: Arc<dyn DocumentStore>,
    index: &str,
    request: &SearchRequest,
    settings: &ScrollSettings,
    retry: RetryPolicy,
    mut handler: F,
) -> Result<usize, E>
where
    F: FnMut(Vec<Hit>) -> Fut,
    Fut: Future<Output = Result<ScanControl, E>>,
    E: From<StoreError>,
{
    let mut cursor = ScrollCursor::open(store, index, request, settings, retry).await?;
    let mut handled: usize = 0;
    let outcome = loop {
        let page = match cursor.next_page().await {
            Ok(Some(page)) => page,
            Ok(None) => break Ok(handled),
            Err(e) => break Err(E::from(e)),
        };
        handled = handled.saturating_add(page.len());
        match handler(page).await {
            Ok(ScanControl::Continue) => {}
            Ok(ScanControl::Stop) => break Ok(handled),
            Err(e) => break Err(e),
        }
    };
    cursor.close().await;
    outcome
}
