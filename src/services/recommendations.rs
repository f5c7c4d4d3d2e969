//! Recommendation queries and projection maintenance
//!
//! The realtime read goes to the cache and only trusts an entry created today.
//! Daily, weekly and by-id reads go to the document store. Retraction and
//! projection rebuild keep the cache derived from the store.

use bson::doc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::{self, ProjectionCache};
use crate::db::schemas::{RecommendationDoc, RecommendationProjection};
use crate::db::{DocumentStore, ListOptions, TypedCollection};
use crate::types::{parse_day, Clock, HealthError, Result, DAY_FORMAT};

/// Message for both a missing and a stale realtime entry
const NO_REALTIME_DATA: &str = "no health recommendation for today";

/// Days covered by a weekly summary before its start date
const WEEK_SPAN_DAYS: i64 = 7;

/// Realtime view of a user's newest recommendation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealtimeRecommendation {
    pub recommendation_type: String,
    pub description: String,
    pub priority: i32,
}

impl From<RecommendationProjection> for RealtimeRecommendation {
    fn from(projection: RecommendationProjection) -> Self {
        Self {
            recommendation_type: projection.recommendation_type,
            description: projection.description,
            priority: projection.priority,
        }
    }
}

/// Outcome of a projection rebuild
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProjectionRebuild {
    /// The newest live recommendation is now cached
    Refreshed { id: String, created_at: String },
    /// No live recommendation remains; the cache entry was dropped
    Cleared,
}

#[derive(Clone)]
pub struct RecommendationService {
    recommendations: TypedCollection<RecommendationDoc>,
    cache: Arc<dyn ProjectionCache>,
    clock: Arc<dyn Clock>,
}

impl RecommendationService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        cache: Arc<dyn ProjectionCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            recommendations: TypedCollection::new(store),
            cache,
            clock,
        }
    }

    /// Today's cached recommendation for a user
    ///
    /// A missing entry and an entry from another day are the same NotFound.
    pub async fn realtime(&self, user_id: &str) -> Result<RealtimeRecommendation> {
        let projection = cache::get_projection(self.cache.as_ref(), user_id)
            .await?
            .ok_or_else(|| HealthError::NotFound(NO_REALTIME_DATA.to_string()))?;

        let today = self.clock.today();
        if projection.created_at != today {
            debug!(
                user_id,
                cached_day = %projection.created_at,
                today = %today,
                "Cached recommendation is stale"
            );
            return Err(HealthError::NotFound(NO_REALTIME_DATA.to_string()));
        }

        Ok(projection.into())
    }

    /// Recommendations ingested for a user on `date` (`YYYY/MM/DD`)
    pub async fn daily(&self, user_id: &str, date: &str) -> Result<Vec<RecommendationProjection>> {
        let day = format_day_string(date)?;

        let rows = self
            .recommendations
            .find_many(
                doc! { "user_id": user_id, "created_at": day.as_str() },
                ListOptions::sorted(doc! { "metadata.created_at": 1 }),
            )
            .await?;

        if rows.is_empty() {
            return Err(HealthError::NotFound(format!(
                "no health recommendations for {} on {}",
                user_id, day
            )));
        }

        Ok(rows.iter().map(RecommendationDoc::projection).collect())
    }

    /// Recommendations for a user from seven days before `start_date` up to
    /// and including it
    pub async fn weekly(
        &self,
        user_id: &str,
        start_date: &str,
    ) -> Result<Vec<RecommendationProjection>> {
        let start = parse_day(start_date)?;
        let week_ago = start
            .checked_sub_signed(chrono::Duration::days(WEEK_SPAN_DAYS))
            .ok_or_else(|| {
                HealthError::BadRequest(format!("start_date '{}' is out of range", start_date))
            })?;
        let from = week_ago.format(DAY_FORMAT).to_string();
        let to = start.format(DAY_FORMAT).to_string();

        let rows = self
            .recommendations
            .find_many(
                doc! {
                    "user_id": user_id,
                    "created_at": { "$gte": from.as_str(), "$lte": to.as_str() },
                },
                ListOptions::sorted(doc! { "created_at": 1, "metadata.created_at": 1 }),
            )
            .await?;

        debug!(user_id, from = %from, to = %to, count = rows.len(), "Weekly summary");
        Ok(rows.iter().map(RecommendationDoc::projection).collect())
    }

    /// A single live recommendation by id
    pub async fn by_id(&self, id: &str) -> Result<RecommendationProjection> {
        self.recommendations
            .find_one(doc! { "id": id })
            .await?
            .map(|row| row.projection())
            .ok_or_else(|| HealthError::NotFound(format!("recommendation {} not found", id)))
    }

    /// Soft-delete a recommendation and re-derive its user's cache entry
    pub async fn retract(&self, id: &str) -> Result<ProjectionRebuild> {
        let row = self
            .recommendations
            .find_one(doc! { "id": id })
            .await?
            .ok_or_else(|| HealthError::NotFound(format!("recommendation {} not found", id)))?;

        let matched = self.recommendations.soft_delete(doc! { "id": id }).await?;
        if matched == 0 {
            return Err(HealthError::NotFound(format!("recommendation {} not found", id)));
        }

        info!(id, user_id = %row.user_id, "Recommendation retracted");
        self.rebuild_projection(&row.user_id).await
    }

    /// Replace the user's cache entry with their newest live recommendation
    pub async fn rebuild_projection(&self, user_id: &str) -> Result<ProjectionRebuild> {
        let newest = self
            .recommendations
            .find_many(
                doc! { "user_id": user_id },
                ListOptions::sorted(doc! { "metadata.created_at": -1, "created_at": -1 })
                    .with_limit(1),
            )
            .await?
            .into_iter()
            .next();

        match newest {
            Some(row) => {
                cache::put_projection(self.cache.as_ref(), &row.projection()).await?;
                debug!(user_id, id = %row.id, "Projection rebuilt");
                Ok(ProjectionRebuild::Refreshed {
                    id: row.id,
                    created_at: row.created_at,
                })
            }
            None => {
                self.cache.remove(user_id).await?;
                debug!(user_id, "Projection cleared");
                Ok(ProjectionRebuild::Cleared)
            }
        }
    }
}

/// Normalize a caller-supplied day to `YYYY/MM/DD`
fn format_day_string(date: &str) -> Result<String> {
    Ok(parse_day(date)?.format(DAY_FORMAT).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::schemas::Metadata;
    use crate::db::MemoryDocumentStore;
    use crate::types::FixedClock;
    use chrono::TimeZone;

    struct Fixture {
        store: Arc<MemoryDocumentStore>,
        cache: Arc<MemoryCache>,
        clock: Arc<FixedClock>,
        service: RecommendationService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryDocumentStore::new());
        let cache = Arc::new(MemoryCache::new());
        let clock = Arc::new(FixedClock::new(
            chrono::Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap(),
        ));
        let service = RecommendationService::new(store.clone(), cache.clone(), clock.clone());
        Fixture {
            store,
            cache,
            clock,
            service,
        }
    }

    async fn seed(fixture: &Fixture, id: &str, user_id: &str, day: &str, hour: u32) {
        let at = parse_day(day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
            .and_utc();
        let row = RecommendationDoc {
            metadata: Metadata::stamped(at),
            id: id.into(),
            user_id: user_id.into(),
            recommendation_type: "exercise".into(),
            description: format!("plan {}", id),
            priority: 1,
            created_at: day.into(),
            updated_at: day.into(),
            ..Default::default()
        };
        TypedCollection::<RecommendationDoc>::new(fixture.store.clone())
            .insert_one(&row)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_realtime_requires_todays_entry() {
        let fx = fixture();
        assert!(fx.service.realtime("u1").await.unwrap_err().is_not_found());

        seed(&fx, "r1", "u1", "2024/05/10", 8).await;
        fx.service.rebuild_projection("u1").await.unwrap();
        let realtime = fx.service.realtime("u1").await.unwrap();
        assert_eq!(realtime.description, "plan r1");

        fx.clock.advance_days(1);
        let stale = fx.service.realtime("u1").await.unwrap_err();
        let missing = fx.service.realtime("nobody").await.unwrap_err();
        assert_eq!(stale.to_string(), missing.to_string());
    }

    #[tokio::test]
    async fn test_daily_lists_one_day() {
        let fx = fixture();
        seed(&fx, "r1", "u1", "2024/05/09", 8).await;
        seed(&fx, "r2", "u1", "2024/05/10", 8).await;
        seed(&fx, "r3", "u1", "2024/05/10", 9).await;
        seed(&fx, "r4", "u2", "2024/05/10", 9).await;

        let rows = fx.service.daily("u1", "2024/05/10").await.unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r2", "r3"]);

        assert!(fx.service.daily("u1", "2024/05/01").await.unwrap_err().is_not_found());
        assert!(matches!(
            fx.service.daily("u1", "yesterday").await,
            Err(HealthError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_weekly_window_is_inclusive() {
        let fx = fixture();
        seed(&fx, "before", "u1", "2024/05/02", 8).await;
        seed(&fx, "first", "u1", "2024/05/03", 8).await;
        seed(&fx, "last", "u1", "2024/05/10", 8).await;
        seed(&fx, "after", "u1", "2024/05/11", 8).await;

        let rows = fx.service.weekly("u1", "2024/05/10").await.unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "last"]);

        assert!(matches!(
            fx.service.weekly("u1", "2024-05-10").await,
            Err(HealthError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_weekly_rejects_out_of_range_start() {
        let fx = fixture();

        for start in ["-262143/01/01", "+262142/12/31", "0000/01/01"] {
            assert!(matches!(
                fx.service.weekly("u1", start).await,
                Err(HealthError::BadRequest(_))
            ));
        }

        // Earliest accepted start still yields a window
        assert!(fx.service.weekly("u1", "0001/01/01").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retract_falls_back_to_previous_recommendation() {
        let fx = fixture();
        seed(&fx, "old", "u1", "2024/05/09", 8).await;
        seed(&fx, "new", "u1", "2024/05/10", 8).await;
        fx.service.rebuild_projection("u1").await.unwrap();

        let outcome = fx.service.retract("new").await.unwrap();
        assert_eq!(
            outcome,
            ProjectionRebuild::Refreshed {
                id: "old".into(),
                created_at: "2024/05/09".into()
            }
        );
        assert!(fx.service.by_id("new").await.unwrap_err().is_not_found());
        // Yesterday's entry is cached but not fresh
        assert!(fx.service.realtime("u1").await.unwrap_err().is_not_found());

        assert_eq!(fx.service.retract("old").await.unwrap(), ProjectionRebuild::Cleared);
        assert!(fx.cache.is_empty());
        assert!(fx.service.retract("old").await.unwrap_err().is_not_found());
    }
}
