//! Generic LRU-with-TTL cache. Entries live in a [`DashMap`] so reads and
//! writes for different keys never contend; recency order for capacity
//! eviction is tracked separately behind a short-lived `Mutex`, never
//! held across an `.await`.
//!
//! Mirrors the `OrderedDict` + `Lock` pattern used for session and
//! paused-workflow state, combined with the `Instant`-based expiry check
//! used for token-blacklist style caches: move-to-front on access,
//! opportunistic TTL cleanup on insert, capacity eviction from the back.

use std::collections::VecDeque;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use dashmap::DashMap;

struct Entry<V> {
    value: V,
    stored_at: Instant,
}

pub struct LruTtlCache<K, V> {
    entries: DashMap<K, Entry<V>>,
    /// Recency order, most-recently-used at the front.
    order: Mutex<VecDeque<K>>,
    capacity: usize,
    ttl: Duration,
}

impl<K, V> LruTtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            capacity,
            ttl,
        }
    }

    fn touch(&self, key: &K) {
        let mut order = self.order.lock().unwrap();
        if let Some(pos) = order.iter().position(|k| k == key) {
            order.remove(pos);
        }
        order.push_front(key.clone());
    }

    fn drop_from_order(&self, key: &K) {
        let mut order = self.order.lock().unwrap();
        if let Some(pos) = order.iter().position(|k| k == key) {
            order.remove(pos);
        }
    }

    fn cleanup_expired(&self) {
        let ttl = self.ttl;
        let now = Instant::now();
        let expired: Vec<K> = self
            .entries
            .iter()
            .filter(|e| now.duration_since(e.value().stored_at) > ttl)
            .map(|e| e.key().clone())
            .collect();
        for key in expired {
            self.entries.remove(&key);
            self.drop_from_order(&key);
        }
    }

    /// Returns the value if present and not expired; moves it to the
    /// front of the recency order on hit.
    pub fn get(&self, key: &K) -> Option<V> {
        let expired = self
            .entries
            .get(key)
            .map(|e| Instant::now().duration_since(e.stored_at) > self.ttl)
            .unwrap_or(false);

        if expired {
            self.entries.remove(key);
            self.drop_from_order(key);
            return None;
        }

        let value = self.entries.get(key).map(|e| e.value.clone())?;
        self.touch(key);
        Some(value)
    }

    /// Retrieves and removes an entry atomically (used by the
    /// paused-workflow cache — an entry is consumed exactly once).
    pub fn take(&self, key: &K) -> Option<V> {
        let (_, entry) = self.entries.remove(key)?;
        self.drop_from_order(key);
        if Instant::now().duration_since(entry.stored_at) > self.ttl {
            return None;
        }
        Some(entry.value)
    }

    /// Inserts at the front, opportunistically sweeps expired entries,
    /// then evicts the least-recently-used entries over capacity.
    pub fn put(&self, key: K, value: V) {
        self.entries.insert(
            key.clone(),
            Entry {
                value,
                stored_at: Instant::now(),
            },
        );
        self.touch(&key);

        self.cleanup_expired();

        while self.entries.len() > self.capacity {
            let oldest = self.order.lock().unwrap().pop_back();
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }

    pub fn remove(&self, key: &K) {
        self.entries.remove(key);
        self.drop_from_order(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_after_put_returns_value() {
        let cache: LruTtlCache<String, i32> = LruTtlCache::new(10, Duration::from_secs(60));
        cache.put("a".to_string(), 1);
        assert_eq!(cache.get(&"a".to_string()), Some(1));
    }

    #[test]
    fn evicts_least_recently_used_over_capacity() {
        let cache: LruTtlCache<i32, i32> = LruTtlCache::new(2, Duration::from_secs(60));
        cache.put(1, 10);
        cache.put(2, 20);
        cache.get(&1); // touch 1, making 2 the LRU
        cache.put(3, 30);
        assert_eq!(cache.get(&2), None);
        assert_eq!(cache.get(&1), Some(10));
        assert_eq!(cache.get(&3), Some(30));
    }

    #[test]
    fn expired_entry_is_not_returned() {
        let cache: LruTtlCache<&str, i32> = LruTtlCache::new(10, Duration::from_millis(1));
        cache.put("a", 1);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get(&"a"), None);
    }

    #[test]
    fn take_removes_entry() {
        let cache: LruTtlCache<&str, i32> = LruTtlCache::new(10, Duration::from_secs(60));
        cache.put("a", 1);
        assert_eq!(cache.take(&"a"), Some(1));
        assert_eq!(cache.get(&"a"), None);
    }
}
