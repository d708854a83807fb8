//! Paused-workflow cache (C10): clarification contexts awaiting a user
//! answer, LRU-evicted with a 5 minute TTL, removed on first retrieval.

use std::time::Duration;

use crate::cache::lru_ttl::LruTtlCache;
use crate::models::ClarificationRequest;

pub struct PausedWorkflowCache {
    inner: LruTtlCache<String, ClarificationRequest>,
}

impl PausedWorkflowCache {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            inner: LruTtlCache::new(max_entries, ttl),
        }
    }

    pub fn store(&self, request_id: &str, request: ClarificationRequest) {
        self.inner.put(request_id.to_string(), request);
    }

    /// Atomically retrieves and removes the paused entry; a second call
    /// with the same id always returns `None`.
    pub fn take(&self, request_id: &str) -> Option<ClarificationRequest> {
        self.inner.take(&request_id.to_string())
    }
}
