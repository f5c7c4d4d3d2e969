//! Recommendation ingestion
//!
//! Each message becomes a new recommendation row and then replaces the user's
//! cached projection. The two writes are not atomic: when the cache write
//! fails the stored row stands and the projection is repaired later from the
//! store (`RecommendationService::rebuild_projection`).
//!
//! When the queue supplies a message id the row id is derived from it, so a
//! redelivered message hits the unique `id` index instead of adding a row.

use std::sync::Arc;
use tracing::debug;

use super::consumer::{IngestError, IngestHandler};
use super::messages::RecommendationMessage;
use crate::cache::{self, ProjectionCache};
use crate::db::schemas::{Metadata, RecommendationDoc};
use crate::db::{DocumentStore, TypedCollection};
use crate::services::RecommendationService;
use crate::types::{format_day, Clock};

/// Consumer name and durable name on the recommendations queue
pub const RECOMMENDATION_CONSUMER: &str = "recommendation_ingest";

pub struct RecommendationIngest {
    recommendations: TypedCollection<RecommendationDoc>,
    cache: Arc<dyn ProjectionCache>,
    clock: Arc<dyn Clock>,
    service: RecommendationService,
}

impl RecommendationIngest {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        cache: Arc<dyn ProjectionCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            service: RecommendationService::new(
                Arc::clone(&store),
                Arc::clone(&cache),
                Arc::clone(&clock),
            ),
            recommendations: TypedCollection::new(store),
            cache,
            clock,
        }
    }
}

/// Row id for a recommendation, stable for a given queue message
fn recommendation_id(message_id: Option<&str>) -> String {
    match message_id {
        Some(key) => uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, key.as_bytes()).to_string(),
        None => uuid::Uuid::new_v4().to_string(),
    }
}

#[async_trait::async_trait]
impl IngestHandler for RecommendationIngest {
    fn name(&self) -> &'static str {
        RECOMMENDATION_CONSUMER
    }

    async fn handle(&self, payload: &[u8], message_id: Option<&str>) -> Result<(), IngestError> {
        let message: RecommendationMessage = serde_json::from_slice(payload)?;
        message.validate()?;

        let now = self.clock.now();
        let day = format_day(now);
        let recommendation = RecommendationDoc {
            _id: None,
            metadata: Metadata::stamped(now),
            id: recommendation_id(message_id),
            user_id: message.user_id,
            recommendation_type: message.recommendation_type,
            description: message.description,
            priority: message.priority,
            created_at: day.clone(),
            updated_at: day,
        };

        match self.recommendations.insert_one(&recommendation).await {
            Ok(()) => {}
            Err(e) if e.is_conflict() => {
                // Already stored by an earlier delivery; the projection may have
                // been skipped then, so derive it from the store
                self.service
                    .rebuild_projection(&recommendation.user_id)
                    .await
                    .map_err(IngestError::Projection)?;
                debug!(id = %recommendation.id, "Recommendation already stored");
                return Ok(());
            }
            Err(e) => return Err(IngestError::Persist(e)),
        }

        cache::put_projection(self.cache.as_ref(), &recommendation.projection())
            .await
            .map_err(IngestError::Projection)?;

        debug!(
            id = %recommendation.id,
            user_id = %recommendation.user_id,
            "Stored recommendation and refreshed projection"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::schemas::RECOMMENDATION_COLLECTION;
    use crate::db::MemoryDocumentStore;
    use crate::types::{FixedClock, HealthError, Result};
    use chrono::TimeZone;

    /// Cache whose writes always fail
    struct BrokenCache;

    #[async_trait::async_trait]
    impl ProjectionCache for BrokenCache {
        async fn set(&self, _key: &str, _value: String) -> Result<()> {
            Err(HealthError::Cache("connection refused".into()))
        }

        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }

        async fn remove(&self, _key: &str) -> Result<()> {
            Ok(())
        }
    }

    fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::new(
            chrono::Utc.with_ymd_and_hms(2024, 5, 1, 23, 59, 0).unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_row_and_projection_share_id_and_day() {
        let store = Arc::new(MemoryDocumentStore::new());
        let cache = Arc::new(MemoryCache::new());
        let ingest = RecommendationIngest::new(store.clone(), cache.clone(), clock());

        ingest
            .handle(br#"{"user_id":"u1","recommendation_type":"diet","description":"more fiber","priority":1}"#, None)
            .await
            .unwrap();

        let rows = store.raw(RECOMMENDATION_COLLECTION).await;
        assert_eq!(rows.len(), 1);
        let projection = cache::get_projection(cache.as_ref(), "u1").await.unwrap().unwrap();
        assert_eq!(projection.id, rows[0].get_str("id").unwrap());
        assert_eq!(projection.created_at, "2024/05/01");
        assert_eq!(rows[0].get_str("updated_at").unwrap(), "2024/05/01");
    }

    #[tokio::test]
    async fn test_cache_failure_keeps_durable_row() {
        let store = Arc::new(MemoryDocumentStore::new());
        let ingest = RecommendationIngest::new(store.clone(), Arc::new(BrokenCache), clock());

        let result = ingest
            .handle(br#"{"user_id":"u1","recommendation_type":"sleep","description":"bed by 11","priority":3}"#, None)
            .await;

        assert!(matches!(result, Err(IngestError::Projection(_))));
        assert_eq!(store.count(RECOMMENDATION_COLLECTION).await, 1);
    }

    #[tokio::test]
    async fn test_invalid_message_writes_nothing() {
        let store = Arc::new(MemoryDocumentStore::new());
        let cache = Arc::new(MemoryCache::new());
        let ingest = RecommendationIngest::new(store.clone(), cache.clone(), clock());

        let result = ingest.handle(br#"{"user_id":"","priority":1}"#, None).await;

        assert!(matches!(result, Err(IngestError::Invalid(_))));
        assert_eq!(store.count(RECOMMENDATION_COLLECTION).await, 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_id_is_stable_per_message() {
        assert_eq!(
            recommendation_id(Some("HEALTH_INGEST:7")),
            recommendation_id(Some("HEALTH_INGEST:7"))
        );
        assert_ne!(
            recommendation_id(Some("HEALTH_INGEST:7")),
            recommendation_id(Some("HEALTH_INGEST:8"))
        );
        assert_ne!(recommendation_id(None), recommendation_id(None));
    }

    #[tokio::test]
    async fn test_redelivery_keeps_one_row_and_repairs_projection() {
        let store = Arc::new(MemoryDocumentStore::new());
        let payload = br#"{"user_id":"u1","recommendation_type":"diet","description":"more fiber","priority":1}"#;

        // First delivery lands in the store but not in the cache
        let broken = RecommendationIngest::new(store.clone(), Arc::new(BrokenCache), clock());
        assert!(broken.handle(payload, Some("HEALTH_INGEST:7")).await.is_err());

        let cache = Arc::new(MemoryCache::new());
        let ingest = RecommendationIngest::new(store.clone(), cache.clone(), clock());
        ingest.handle(payload, Some("HEALTH_INGEST:7")).await.unwrap();

        assert_eq!(store.count(RECOMMENDATION_COLLECTION).await, 1);
        let projection = cache::get_projection(cache.as_ref(), "u1").await.unwrap().unwrap();
        assert_eq!(projection.id, recommendation_id(Some("HEALTH_INGEST:7")));
    }
}
