use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tax_core::{CacheError, CacheStore};
use tokio::sync::RwLock;
use tracing::trace;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// Process-local TTL store, used when Redis is disabled and in tests
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) keys
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.expires_at > now => {
                    trace!("Memory cache hit: {}", key);
                    return Ok(Some(entry.value.clone()));
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }

        // A writer may have refreshed the key since the read lock was released
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let entry = Entry {
            value: value.to_string(),
            expires_at: now + ttl,
        };
        let mut entries = self.entries.write().await;
        entries.retain(|_, e| e.expires_at > now);
        entries.insert(key.to_string(), entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = MemoryCache::new();
        cache.set("k", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let cache = MemoryCache::new();
        cache.set("k", "v", Duration::from_millis(10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty().await);
        assert!(cache.entries.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_set_sweeps_expired_keys() {
        let cache = MemoryCache::new();
        cache.set("old-1", "v", Duration::from_millis(5)).await.unwrap();
        cache.set("old-2", "v", Duration::from_millis(5)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        cache.set("fresh", "v", Duration::from_secs(60)).await.unwrap();
        let keys: Vec<String> = cache.entries.read().await.keys().cloned().collect();
        assert_eq!(keys, vec!["fresh".to_string()]);
    }

    #[tokio::test]
    async fn test_reader_blocked_by_refresh_sees_new_value() {
        let cache = MemoryCache::new();
        cache.set("k", "stale", Duration::from_millis(5)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        // refresh while a reader is queued behind the writer
        let mut guard = cache.entries.write().await;
        let reader = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get("k").await })
        };
        tokio::task::yield_now().await;
        guard.insert(
            "k".to_string(),
            Entry {
                value: "fresh".to_string(),
                expires_at: Instant::now() + Duration::from_secs(60),
            },
        );
        drop(guard);

        let seen = reader.await.unwrap().unwrap();
        assert_eq!(seen, Some("fresh".to_string()));
        assert_eq!(cache.get("k").await.unwrap(), Some("fresh".to_string()));
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let cache = MemoryCache::new();
        cache.set("k", "first", Duration::from_secs(60)).await.unwrap();
        cache.set("k", "second", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some("second".to_string()));
    }
}
