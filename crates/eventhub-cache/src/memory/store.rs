//! In-memory cache implementation using the moka crate.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use tracing::debug;

use eventhub_core::config::cache::MemoryCacheConfig;
use eventhub_core::result::AppResult;
use eventhub_core::traits::cache::CacheProvider;

/// A cached value together with the TTL it was written with.
#[derive(Debug, Clone)]
struct Entry {
    value: String,
    ttl: Duration,
}

/// Expires each entry after its own TTL, restarting on overwrite.
struct PerEntryExpiry;

impl Expiry<String, Entry> for PerEntryExpiry {
    fn expire_after_create(&self, _key: &String, value: &Entry, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-memory cache provider using moka.
#[derive(Debug, Clone)]
pub struct MemoryCacheProvider {
    /// The underlying moka cache.
    cache: Cache<String, Entry>,
}

impl MemoryCacheProvider {
    /// Create a new in-memory cache from configuration.
    pub fn new(config: &MemoryCacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(PerEntryExpiry)
            .build();

        Self { cache }
    }
}

#[async_trait]
impl CacheProvider for MemoryCacheProvider {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.cache.get(key).await.map(|entry| entry.value))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        if ttl.is_zero() {
            self.cache.invalidate(key).await;
            return Ok(());
        }
        self.cache
            .insert(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    ttl,
                },
            )
            .await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        Ok(self.cache.get(key).await.is_some())
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }

    async fn flush_all(&self) -> AppResult<()> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        debug!("In-memory cache flushed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_provider() -> MemoryCacheProvider {
        MemoryCacheProvider::new(&MemoryCacheConfig { max_capacity: 1000 })
    }

    #[tokio::test]
    async fn test_set_get() {
        let provider = make_provider();
        provider
            .set("key1", "value1", Duration::from_secs(60))
            .await
            .unwrap();
        let val = provider.get("key1").await.unwrap();
        assert_eq!(val, Some("value1".to_string()));
    }

    #[tokio::test]
    async fn test_delete() {
        let provider = make_provider();
        provider
            .set("key2", "value2", Duration::from_secs(60))
            .await
            .unwrap();
        provider.delete("key2").await.unwrap();
        assert_eq!(provider.get("key2").await.unwrap(), None);
        assert!(!provider.exists("key2").await.unwrap());
    }

    #[tokio::test]
    async fn test_entry_expires_after_its_own_ttl() {
        let provider = make_provider();
        provider
            .set("short", "a", Duration::from_millis(30))
            .await
            .unwrap();
        provider
            .set("long", "b", Duration::from_secs(60))
            .await
            .unwrap();

        std::thread::sleep(Duration::from_millis(80));

        assert_eq!(provider.get("short").await.unwrap(), None);
        assert_eq!(provider.get("long").await.unwrap(), Some("b".to_string()));
    }

    #[tokio::test]
    async fn test_zero_ttl_evicts() {
        let provider = make_provider();
        provider
            .set("k", "v", Duration::from_secs(60))
            .await
            .unwrap();
        provider.set("k", "v2", Duration::ZERO).await.unwrap();
        assert_eq!(provider.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_json_roundtrip() {
        let provider = make_provider();
        let data = serde_json::json!({"body": "raid", "capacity": 5});
        provider
            .set_json("json_key", &data, Duration::from_secs(60))
            .await
            .unwrap();
        let result: Option<serde_json::Value> = provider.get_json("json_key").await.unwrap();
        assert_eq!(result, Some(data));
    }

    #[tokio::test]
    async fn test_flush_all() {
        let provider = make_provider();
        provider
            .set("a", "1", Duration::from_secs(60))
            .await
            .unwrap();
        provider.flush_all().await.unwrap();
        assert_eq!(provider.get("a").await.unwrap(), None);
        assert!(provider.health_check().await.unwrap());
    }
}
