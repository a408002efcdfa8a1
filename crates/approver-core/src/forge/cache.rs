//! Always-stale response cache with conditional revalidation.
//!
//! Every cached entry is treated as stale: each request still goes to the
//! forge carrying `If-None-Match`, and only a `304 Not Modified` answer is
//! served from the stored body. Visible freshness is therefore identical to
//! an uncached client; the cache only saves response-body transfer.

use std::collections::HashMap;
use std::sync::Mutex;

/// A stored validator/body pair for one URL.
#[derive(Debug, Clone)]
struct Entry {
    etag: String,
    body: Vec<u8>,
}

/// In-memory ETag cache keyed by request URL.
#[derive(Debug, Default)]
pub struct EtagCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl EtagCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the validator to send as `If-None-Match` for `url`, if any.
    #[must_use]
    pub fn validator(&self, url: &str) -> Option<String> {
        self.entries
            .lock()
            .map(|entries| entries.get(url).map(|e| e.etag.clone()))
            .unwrap_or_default()
    }

    /// Records the response body for `url` under the given validator.
    pub fn store(&self, url: &str, etag: &str, body: &[u8]) {
        if etag.is_empty() {
            return;
        }
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                url.to_owned(),
                Entry {
                    etag: etag.to_owned(),
                    body: body.to_vec(),
                },
            );
        }
    }

    /// Replays the stored body for `url` after a `304 Not Modified`.
    #[must_use]
    pub fn replay(&self, url: &str) -> Option<Vec<u8>> {
        self.entries
            .lock()
            .map(|entries| entries.get(url).map(|e| e.body.clone()))
            .unwrap_or_default()
    }
}
