//! Generic page-walking
//!
//! Every "get all X" operation and every watch loop that needs more than one
//! page goes through [`PageWalk`]. The walk asks for pages `1..=max_pages`
//! in order and terminates on the first of:
//!
//! - an empty page (no more data)
//! - a partial page (`len < per_page`), which conclusively signals the last
//!   page, so the naive "keep going until an empty page" implementation's
//!   one wasted trailing request is never issued
//! - the stop predicate matching an item (the match itself is excluded)
//! - `max_pages` reached
//!
//! There are no retries in here: a failed fetch aborts the whole walk and
//! the caller decides whether to walk again.

use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::error::Result;

/// Default items per page
pub const DEFAULT_PER_PAGE: u32 = 20;
/// Default page cap
pub const DEFAULT_MAX_PAGES: u32 = 50;
/// Default courtesy delay between pages
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_millis(300);

/// Builder for a pagination walk.
pub struct PageWalk<T> {
    per_page: u32,
    max_pages: u32,
    page_delay: Option<Duration>,
    stop_when: Option<Box<dyn Fn(&T) -> bool + Send + Sync>>,
}

impl<T> PageWalk<T> {
    /// Start a walk expecting `per_page` items on a full page.
    pub fn new(per_page: u32) -> Self {
        Self {
            per_page,
            max_pages: DEFAULT_MAX_PAGES,
            page_delay: Some(DEFAULT_PAGE_DELAY),
            stop_when: None,
        }
    }

    /// Cap the number of pages requested.
    pub fn max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Sleep between pages (never before the first). `None` disables the
    /// courtesy delay.
    pub fn page_delay(mut self, delay: Option<Duration>) -> Self {
        self.page_delay = delay;
        self
    }

    /// Halt accumulation when an item matches. The matching item is not
    /// included in the result and no further pages are requested.
    pub fn stop_when(mut self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.stop_when = Some(Box::new(predicate));
        self
    }

    /// Run the walk against `fetch(page) -> Result<Vec<T>>`.
    pub async fn run<F, Fut>(self, mut fetch: F) -> Result<Vec<T>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<Vec<T>>>,
    {
        let mut all = Vec::new();

        for page in 1..=self.max_pages {
            if page > 1 {
                if let Some(delay) = self.page_delay {
                    tokio::time::sleep(delay).await;
                }
            }

            let items = fetch(page).await?;
            if items.is_empty() {
                debug!(page, "empty page, stopping walk");
                break;
            }

            let full_page = items.len() >= self.per_page as usize;
            let mut stopped = false;
            for item in items {
                if let Some(pred) = &self.stop_when {
                    if pred(&item) {
                        debug!(page, "stop predicate hit");
                        stopped = true;
                        break;
                    }
                }
                all.push(item);
            }
            if stopped {
                break;
            }

            // Partial page: last page reached, skip the confirming request.
            if !full_page {
                debug!(page, total = all.len(), "partial page, stopping walk");
                break;
            }

            debug!(page, total = all.len(), "page accumulated");
        }

        Ok(all)
    }
}
