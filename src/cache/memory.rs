//! In-memory projection cache

use dashmap::DashMap;
use std::sync::Arc;

use super::ProjectionCache;
use crate::types::Result;

/// DashMap-backed cache for tests and dev mode
#[derive(Clone, Default)]
pub struct MemoryCache {
    entries: Arc<DashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait::async_trait]
impl ProjectionCache for MemoryCache {
    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_overwrites() {
        let cache = MemoryCache::new();
        cache.set("u1", "first".into()).await.unwrap();
        cache.set("u1", "second".into()).await.unwrap();

        assert_eq!(cache.get("u1").await.unwrap().as_deref(), Some("second"));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_and_removed_keys() {
        let cache = MemoryCache::new();
        assert!(cache.get("nobody").await.unwrap().is_none());

        cache.set("u1", "v".into()).await.unwrap();
        cache.remove("u1").await.unwrap();
        assert!(cache.get("u1").await.unwrap().is_none());
        assert!(cache.is_empty());
    }
}
