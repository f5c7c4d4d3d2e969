//! Redis-backed projection cache

use redis::{aio::ConnectionManager, AsyncCommands, Client};
use tracing::info;

use super::ProjectionCache;
use crate::types::{HealthError, Result};

/// Redis cache using a reconnecting connection manager
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
}

impl RedisCache {
    /// Connect and verify the server answers PING
    pub async fn new(url: &str) -> Result<Self> {
        info!("Connecting to Redis at {}", url);

        let client = Client::open(url)
            .map_err(|e| HealthError::Cache(format!("Invalid Redis URL: {}", e)))?;

        let connection = client
            .get_connection_manager()
            .await
            .map_err(|e| HealthError::Cache(format!("Failed to connect to Redis: {}", e)))?;

        let mut ping = connection.clone();
        let _pong: String = redis::cmd("PING")
            .query_async(&mut ping)
            .await
            .map_err(|e| HealthError::Cache(format!("Redis ping failed: {}", e)))?;

        info!("Connected to Redis");
        Ok(Self { connection })
    }
}

#[async_trait::async_trait]
impl ProjectionCache for RedisCache {
    async fn set(&self, key: &str, value: String) -> Result<()> {
        let mut connection = self.connection.clone();
        let _: () = connection.set(key, value).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut connection = self.connection.clone();
        let value: Option<String> = connection.get(key).await?;
        Ok(value)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut connection = self.connection.clone();
        let _: () = connection.del(key).await?;
        Ok(())
    }
}
