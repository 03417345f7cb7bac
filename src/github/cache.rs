//! Short-lived response cache

use mini_moka::sync::Cache;
use std::time::Duration;

/// Upper bound on cached responses; listings and READMEs are small
const MAX_ENTRIES: u64 = 4096;

/// A cached response body, with the next-page link for paginated listings
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub body: Vec<u8>,
    pub next: Option<String>,
}

/// URL-keyed cache with a fixed time-to-live. Clones share entries.
#[derive(Clone)]
pub struct ResponseCache {
    entries: Cache<String, CachedResponse>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(MAX_ENTRIES)
                .build(),
        }
    }

    pub fn get(&self, url: &str) -> Option<CachedResponse> {
        self.entries.get(&url.to_string())
    }

    pub fn insert(&self, url: &str, response: CachedResponse) {
        self.entries.insert(url.to_string(), response);
    }

    /// Invalidate every entry
    pub fn clear(&self) {
        self.entries.invalidate_all();
    }
}
