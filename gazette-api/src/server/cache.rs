use axum::body::Bytes;
use moka::future::Cache;
use std::{
    fmt::{Debug, Formatter},
    time::Duration,
};
use tracing::{debug, info};

pub const DEFAULT_PAGE_CACHE_TTL: Duration = Duration::from_secs(20);
pub const DEFAULT_PAGE_CACHE_CAPACITY: u64 = 1000;

/// Rendered pages keyed by what was requested.
///
/// Entries are served unchanged until they expire or the cache is cleared, even
/// if the records they were rendered from changed in the meantime.
#[derive(Clone)]
pub struct PageCache {
    pages: Cache<String, Bytes>,
    ttl: Duration,
}

impl PageCache {
    #[must_use]
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        let pages = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();

        Self { pages, ttl }
    }

    pub async fn get(&self, key: &str) -> Option<Bytes> {
        self.pages.get(key).await
    }

    pub async fn insert(&self, key: String, page: Bytes) {
        self.pages.insert(key, page).await;
    }

    /// Serves the cached page for `key`, rendering and caching it on a miss.
    pub async fn get_or_render<F, Fut, E>(&self, key: String, render: F) -> Result<Bytes, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Bytes, E>>,
    {
        if let Some(page) = self.get(&key).await {
            debug!(key, "Serving cached page");
            return Ok(page);
        }

        let page = render().await?;
        self.insert(key, page.clone()).await;
        Ok(page)
    }

    pub fn clear(&self) {
        self.pages.invalidate_all();
        info!("Cleared page cache");
    }
}

impl Default for PageCache {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_CACHE_TTL, DEFAULT_PAGE_CACHE_CAPACITY)
    }
}

impl Debug for PageCache {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageCache")
            .field("ttl", &self.ttl)
            .field("entries", &self.pages.entry_count())
            .finish()
    }
}
