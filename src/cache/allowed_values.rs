//! Allowed-values provider (C4): a stale-while-revalidate cache of
//! DB-sourced enumerations, keyed by `(table, column)`.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use crate::collaborators::SqlExecutor;

static TABLE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_.]*$").unwrap());
static COLUMN_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub struct AllowedValuesResult {
    pub values: Vec<String>,
    pub is_partial: bool,
}

#[derive(Clone)]
struct CacheEntry {
    values: Vec<String>,
    loaded_at: Instant,
    is_partial: bool,
}

type Key = (String, String);

struct Inner {
    executor: Arc<dyn SqlExecutor>,
    ttl: Duration,
    max_values: usize,
    cache: AsyncMutex<HashMap<Key, CacheEntry>>,
    locks: AsyncMutex<HashMap<Key, Arc<AsyncMutex<()>>>>,
}

impl Inner {
    async fn key_lock(&self, key: &Key) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(key.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    async fn load(&self, key: &Key) -> Option<AllowedValuesResult> {
        let (table, column) = key;
        let query = format!(
            "SELECT DISTINCT TOP {} [{column}] FROM {table} ORDER BY [{column}]",
            self.max_values + 1
        );

        let result = self.executor.execute(&query, &[]).await;
        if !result.success {
            warn!(table, column, error = ?result.error, "allowed-values db query failed");
            return None;
        }

        let is_partial = result.rows.len() > self.max_values;
        let values: Vec<String> = result
            .rows
            .iter()
            .take(self.max_values)
            .filter_map(|row| row.get(column))
            .filter(|v| !v.is_null())
            .map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();

        self.cache.lock().await.insert(
            key.clone(),
            CacheEntry {
                values: values.clone(),
                loaded_at: Instant::now(),
                is_partial,
            },
        );

        info!(table, column, count = values.len(), is_partial, "loaded allowed values");
        Some(AllowedValuesResult { values, is_partial })
    }

    /// Background refresh — re-enters the loader under the same per-key
    /// lock so a refresh and a foreground miss never race. Errors are
    /// swallowed; they're logged by `load` already.
    async fn refresh(&self, key: Key) {
        let lock = self.key_lock(&key).await;
        let Ok(_guard) = lock.try_lock() else {
            return; // another refresh is already in progress
        };
        self.load(&key).await;
    }
}

/// Spawns a background refresh holding only a weak reference to `inner`,
/// so an in-flight refresh never keeps the provider alive past its last
/// strong handle.
fn spawn_refresh(inner: &Weak<Inner>, key: Key) {
    let weak = inner.clone();
    tokio::spawn(async move {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        inner.refresh(key).await;
    });
}

/// Stale-while-revalidate cache for parameter allowed-value lists.
///
/// Cheap to clone — internal state lives behind an `Arc` so background
/// refresh tasks can outlive the call that spawned them without pinning
/// the caller's future.
#[derive(Clone)]
pub struct AllowedValuesProvider {
    inner: Arc<Inner>,
}

impl AllowedValuesProvider {
    pub fn new(executor: Arc<dyn SqlExecutor>, ttl: Duration, max_values: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                executor,
                ttl,
                max_values,
                cache: AsyncMutex::new(HashMap::new()),
                locks: AsyncMutex::new(HashMap::new()),
            }),
        }
    }

    pub async fn get_allowed_values(&self, table: &str, column: &str) -> Option<AllowedValuesResult> {
        if !TABLE_PATTERN.is_match(table) {
            warn!(table, "invalid table name pattern");
            return None;
        }
        if !COLUMN_PATTERN.is_match(column) {
            warn!(column, "invalid column name pattern");
            return None;
        }

        let key = (table.to_string(), column.to_string());

        let cached = {
            let cache = self.inner.cache.lock().await;
            cache.get(&key).cloned()
        };

        if let Some(entry) = cached {
            let age = Instant::now().duration_since(entry.loaded_at);
            if age <= self.inner.ttl {
                return Some(AllowedValuesResult {
                    values: entry.values,
                    is_partial: entry.is_partial,
                });
            }

            let stale_result = AllowedValuesResult {
                values: entry.values,
                is_partial: entry.is_partial,
            };
            spawn_refresh(&Arc::downgrade(&self.inner), key);
            return Some(stale_result);
        }

        // Miss: must await the load, serialized per key to avoid a thundering herd.
        let lock = self.inner.key_lock(&key).await;
        let _guard = lock.lock().await;

        let cached = {
            let cache = self.inner.cache.lock().await;
            cache.get(&key).cloned()
        };
        if let Some(entry) = cached {
            return Some(AllowedValuesResult {
                values: entry.values,
                is_partial: entry.is_partial,
            });
        }

        self.inner.load(&key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::ExecutionResult;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingExecutor {
        calls: AtomicUsize,
        rows: Vec<serde_json::Value>,
    }

    #[async_trait]
    impl SqlExecutor for CountingExecutor {
        async fn execute(&self, _sql: &str, _params: &[serde_json::Value]) -> ExecutionResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ExecutionResult {
                success: true,
                columns: vec!["category".to_string()],
                rows: self.rows.clone(),
                row_count: self.rows.len(),
                error: None,
            }
        }
    }

    #[tokio::test]
    async fn rejects_invalid_identifiers_without_querying() {
        let executor = Arc::new(CountingExecutor {
            calls: AtomicUsize::new(0),
            rows: vec![],
        });
        let provider = AllowedValuesProvider::new(executor.clone(), Duration::from_secs(600), 500);
        assert!(provider.get_allowed_values("1bad", "category").await.is_none());
        assert!(provider.get_allowed_values("Sales.Customers", "bad col").await.is_none());
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn second_call_within_ttl_does_not_requery() {
        let executor = Arc::new(CountingExecutor {
            calls: AtomicUsize::new(0),
            rows: vec![json!({"category": "Supermarket"}), json!({"category": "Corporate"})],
        });
        let provider = AllowedValuesProvider::new(executor.clone(), Duration::from_secs(600), 500);

        let first = provider.get_allowed_values("Sales.Customers", "category").await.unwrap();
        let second = provider.get_allowed_values("Sales.Customers", "category").await.unwrap();

        assert_eq!(first.values, second.values);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn marks_partial_when_row_count_exceeds_cap() {
        let rows = vec![json!({"category": "A"}), json!({"category": "B"}), json!({"category": "C"})];
        let executor = Arc::new(CountingExecutor {
            calls: AtomicUsize::new(0),
            rows,
        });
        let provider = AllowedValuesProvider::new(executor, Duration::from_secs(600), 2);
        let result = provider.get_allowed_values("Sales.Customers", "category").await.unwrap();
        assert!(result.is_partial);
        assert_eq!(result.values.len(), 2);
    }
}
