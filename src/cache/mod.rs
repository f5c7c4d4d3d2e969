//! Recommendation cache
//!
//! A single key per user holding the newest recommendation projection as JSON.
//! Entries never expire; staleness is detected at read time by the freshness
//! check in `services::recommendations`.

pub mod memory;
pub mod redis;

pub use self::memory::MemoryCache;
pub use self::redis::RedisCache;

use crate::db::schemas::RecommendationProjection;
use crate::types::Result;

/// Key-value store for serialized projections
#[async_trait::async_trait]
pub trait ProjectionCache: Send + Sync {
    /// Store `value` under `key` with no expiry, replacing any previous value
    async fn set(&self, key: &str, value: String) -> Result<()>;

    /// Fetch the value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Drop the value stored under `key`
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Serialize and store a user's projection under their user id
pub async fn put_projection(
    cache: &dyn ProjectionCache,
    projection: &RecommendationProjection,
) -> Result<()> {
    let value = serde_json::to_string(projection)?;
    cache.set(&projection.user_id, value).await
}

/// Fetch and decode a user's projection
pub async fn get_projection(
    cache: &dyn ProjectionCache,
    user_id: &str,
) -> Result<Option<RecommendationProjection>> {
    match cache.get(user_id).await? {
        Some(value) => Ok(Some(serde_json::from_str(&value)?)),
        None => Ok(None),
    }
}
