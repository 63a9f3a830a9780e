//! Redis cache provider implementation.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::debug;

use eventhub_core::error::{AppError, ErrorKind};
use eventhub_core::result::AppResult;
use eventhub_core::traits::cache::CacheProvider;

use super::client::RedisClient;

/// Redis-backed cache provider.
#[derive(Debug, Clone)]
pub struct RedisCacheProvider {
    client: RedisClient,
}

impl RedisCacheProvider {
    /// Create a new Redis cache provider.
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }

    fn map_err(e: redis::RedisError) -> AppError {
        AppError::with_source(ErrorKind::Cache, format!("Redis error: {e}"), e)
    }
}

#[async_trait]
impl CacheProvider for RedisCacheProvider {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn_mut();
        let result: Option<String> = conn.get(&full_key).await.map_err(Self::map_err)?;
        Ok(result)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn_mut();

        // PSETEX rejects a zero expiry.
        let millis = ttl.as_millis() as u64;
        if millis == 0 {
            let _: () = conn.del(&full_key).await.map_err(Self::map_err)?;
            return Ok(());
        }

        let _: () = conn
            .pset_ex(&full_key, value, millis)
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn_mut();
        let _: () = conn.del(&full_key).await.map_err(Self::map_err)?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn_mut();
        let result: bool = conn.exists(&full_key).await.map_err(Self::map_err)?;
        Ok(result)
    }

    async fn health_check(&self) -> AppResult<bool> {
        let mut conn = self.client.conn_mut();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(pong == "PONG")
    }

    async fn flush_all(&self) -> AppResult<()> {
        // Only keys under our own prefix.
        let pattern = self.client.prefixed_key("eventhub:*");
        let mut conn = self.client.conn_mut();

        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(&pattern)
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

        for key in &keys {
            let _: () = conn.del(key).await.map_err(Self::map_err)?;
        }

        debug!(pattern, count = keys.len(), "Flushed Redis cache keys");
        Ok(())
    }
}
