//! Cache manager that dispatches to the configured provider.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use eventhub_core::config::cache::CacheConfig;
use eventhub_core::error::AppError;
use eventhub_core::result::AppResult;
use eventhub_core::traits::cache::CacheProvider;

/// Cache manager that wraps the configured cache provider.
///
/// The provider is selected at construction time based on configuration.
#[derive(Debug, Clone)]
pub struct CacheManager {
    inner: Arc<dyn CacheProvider>,
}

impl CacheManager {
    /// Create a new cache manager from configuration.
    pub async fn new(config: &CacheConfig) -> AppResult<Self> {
        let inner: Arc<dyn CacheProvider> = match config.provider.as_str() {
            #[cfg(feature = "redis-backend")]
            "redis" => {
                info!("Initializing Redis cache provider");
                let client = crate::redis::RedisClient::connect(&config.redis).await?;
                Arc::new(crate::redis::RedisCacheProvider::new(client))
            }
            #[cfg(feature = "memory")]
            "memory" => {
                info!(
                    max_capacity = config.memory.max_capacity,
                    "Initializing in-memory cache provider"
                );
                Arc::new(crate::memory::MemoryCacheProvider::new(&config.memory))
            }
            other => {
                return Err(AppError::configuration(format!(
                    "Unknown cache provider: '{other}'. Supported: memory, redis"
                )));
            }
        };

        Ok(Self { inner })
    }

    /// Create a cache manager from an existing provider.
    pub fn from_provider(provider: Arc<dyn CacheProvider>) -> Self {
        Self { inner: provider }
    }
}

#[async_trait]
impl CacheProvider for CacheManager {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        self.inner.exists(key).await
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.inner.health_check().await
    }

    async fn flush_all(&self) -> AppResult<()> {
        self.inner.flush_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_provider_rejected() {
        let config = CacheConfig {
            provider: "layered".to_string(),
            ..Default::default()
        };
        let err = CacheManager::new(&config).await.unwrap_err();
        assert_eq!(err.kind, eventhub_core::error::ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_memory_provider_dispatch() {
        let cache = CacheManager::new(&CacheConfig::default()).await.unwrap();
        cache.set("k", "v", Duration::from_secs(5)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));
    }
}
