//! Session cache (C10): per-user conversational state, LRU-evicted with
//! a 30 minute inactivity TTL.

use std::time::Duration;

use crate::cache::lru_ttl::LruTtlCache;
use crate::models::SessionContext;

pub struct SessionCache {
    inner: LruTtlCache<String, SessionContext>,
}

impl SessionCache {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            inner: LruTtlCache::new(max_entries, ttl),
        }
    }

    pub fn get(&self, thread_id: &str) -> Option<SessionContext> {
        self.inner.get(&thread_id.to_string())
    }

    pub fn put(&self, thread_id: &str, context: SessionContext) {
        self.inner.put(thread_id.to_string(), context);
    }

    pub fn clear(&self, thread_id: &str) {
        self.inner.remove(&thread_id.to_string());
    }
}
