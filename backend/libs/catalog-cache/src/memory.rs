//! In-process key-value backend
//!
//! Used for local development and tests. TTLs are honoured lazily on read.

use crate::{CacheResult, KeyValueStore};
use dashmap::DashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// DashMap-backed store with optional per-entry expiry
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: DashMap<String, Entry>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }
}

#[async_trait::async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get_raw(&self, key: &str) -> CacheResult<Option<String>> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                return Ok(Some(entry.value.clone()));
            }
        }

        // Re-checked under the shard lock so a concurrent overwrite survives
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        Ok(None)
    }

    async fn set_raw(&self, key: &str, value: String, ttl: Option<Duration>) -> CacheResult<()> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn del(&self, key: &str) -> CacheResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_set_get_del() {
        let store = InMemoryStore::new();
        store.set_raw("k", "v".into(), None).await.unwrap();
        assert_eq!(store.get_raw("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.len(), 1);

        store.del("k").await.unwrap();
        assert!(store.get_raw("k").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_entry_expires() {
        let store = InMemoryStore::new();
        store
            .set_raw("k", "v".into(), Some(Duration::from_millis(20)))
            .await
            .unwrap();
        assert!(store.contains_key("k"));

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(store.get_raw("k").await.unwrap().is_none());
        assert!(!store.contains_key("k"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_expired_read_keeps_concurrent_overwrite() {
        let store = Arc::new(InMemoryStore::new());
        store
            .set_raw("k", "old".into(), Some(Duration::from_millis(1)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let mut tasks = Vec::new();
        for _ in 0..32 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                let _ = store.get_raw("k").await;
            }));
        }
        let writer = store.clone();
        tasks.push(tokio::spawn(async move {
            writer.set_raw("k", "new".into(), None).await.unwrap();
        }));
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(store.get_raw("k").await.unwrap().as_deref(), Some("new"));
        assert_eq!(store.entries.len(), 1);
    }

    #[tokio::test]
    async fn test_no_ttl_never_expires() {
        let store = InMemoryStore::new();
        store.set_raw("k", "v".into(), None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(store.contains_key("k"));
    }
}
