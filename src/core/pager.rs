//! Paged reads from the relational source
//!
//! [`KeysetPager`] wraps a [`RecordSource`] with the two pagination policies
//! and per-page retry. [`KeysetCursor`] tracks progress through a keyset scan.

use crate::adapters::database::RecordSource;
use crate::config::RetryConfig;
use crate::domain::{Page, RecordKey, Result};
use crate::log_retry_attempt;
use std::future::Future;
use std::sync::Arc;

/// Produces ordered pages from a [`RecordSource`]
///
/// Cheap to clone; clones share the source.
#[derive(Clone)]
pub struct KeysetPager {
    source: Arc<dyn RecordSource>,
    retry: RetryConfig,
}

impl KeysetPager {
    /// Create a pager over `source`
    pub fn new(source: Arc<dyn RecordSource>, retry: RetryConfig) -> Self {
        Self { source, retry }
    }

    /// Total number of rows in the source
    pub async fn count(&self) -> Result<u64> {
        self.with_retry("count", || self.source.count()).await
    }

    /// Offset policy: page `index` covers rows `[index * limit, (index + 1) * limit)`
    pub async fn page_at(&self, index: usize, limit: usize) -> Result<Page> {
        let offset = (index as u64).saturating_mul(limit as u64);
        let rows = self
            .with_retry("page", || self.source.fetch_offset(offset, limit))
            .await?;
        Ok(Page::new(rows, None))
    }

    /// Keyset policy: up to `limit` rows with key greater than `after_key`
    pub async fn next_page(&self, after_key: Option<RecordKey>, limit: usize) -> Result<Page> {
        let rows = self
            .with_retry("page_after_key", || self.source.fetch_after(after_key, limit))
            .await?;
        Ok(Page::new(rows, after_key))
    }

    async fn with_retry<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    log_retry_attempt!(attempt, self.retry.max_retries, e.to_string().as_str());
                    tracing::debug!(operation, "Backing off before retry");
                    tokio::time::sleep(self.retry.delay_for(attempt)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Position of a keyset scan
///
/// The cursor only moves forward: each page's largest key becomes the lower
/// bound of the next request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeysetCursor {
    last_key: Option<RecordKey>,
    pages: usize,
    rows: u64,
    exhausted: bool,
}

impl KeysetCursor {
    /// Cursor positioned before the first row
    pub fn new() -> Self {
        Self::default()
    }

    /// Key the next page must start after
    pub fn after_key(&self) -> Option<RecordKey> {
        self.last_key
    }

    /// Pages consumed so far (empty pages excluded)
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Rows consumed so far
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Whether the scan has reached the end of the source
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Record a fetched page
    ///
    /// An empty page, or one shorter than `limit`, ends the scan.
    pub fn advance(&mut self, page: &Page, limit: usize) {
        if page.is_empty() {
            self.exhausted = true;
            return;
        }
        self.pages += 1;
        self.rows += page.size as u64;
        if let Some(key) = page.last_key() {
            self.last_key = Some(self.last_key.map_or(key, |prev| prev.max(key)));
        }
        if page.is_short(limit) {
            self.exhausted = true;
        }
    }
}
