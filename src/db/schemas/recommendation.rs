//! Health recommendation document schema
//!
//! Recommendations carry day-granularity `created_at`/`updated_at` strings
//! (`YYYY/MM/DD`) next to the instant timestamps in `metadata`. The day
//! strings drive the daily/weekly queries and the realtime freshness check;
//! `metadata.created_at` orders recommendations ingested on the same day.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, Schema};
use crate::db::schemas::Metadata;

/// Collection name for health recommendations
pub const RECOMMENDATION_COLLECTION: &str = "health";

/// Health recommendation stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct RecommendationDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Identifier generated at ingestion time
    pub id: String,

    pub user_id: String,

    /// Category, e.g. "exercise" or "diet"
    pub recommendation_type: String,

    pub description: String,

    pub priority: i32,

    /// Day the recommendation was ingested
    pub created_at: String,

    pub updated_at: String,
}

impl RecommendationDoc {
    /// Cache projection of this recommendation
    pub fn projection(&self) -> RecommendationProjection {
        RecommendationProjection {
            id: self.id.clone(),
            user_id: self.user_id.clone(),
            recommendation_type: self.recommendation_type.clone(),
            description: self.description.clone(),
            priority: self.priority,
            created_at: self.created_at.clone(),
            updated_at: self.updated_at.clone(),
        }
    }
}

/// The subset of a recommendation mirrored into the cache, keyed by user id
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RecommendationProjection {
    pub id: String,
    pub user_id: String,
    pub recommendation_type: String,
    pub description: String,
    pub priority: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl IntoIndexes for RecommendationDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("id_unique".to_string())
                        .build(),
                ),
            ),
            // Daily and weekly summaries
            (
                doc! { "user_id": 1, "created_at": 1 },
                Some(
                    IndexOptions::builder()
                        .name("user_day_index".to_string())
                        .build(),
                ),
            ),
            // Projection rebuild: newest recommendation per user
            (
                doc! { "user_id": 1, "metadata.created_at": -1 },
                Some(
                    IndexOptions::builder()
                        .name("user_latest_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl Schema for RecommendationDoc {
    const COLLECTION: &'static str = RECOMMENDATION_COLLECTION;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_drops_metadata() {
        let doc = RecommendationDoc {
            id: "r1".into(),
            user_id: "u1".into(),
            recommendation_type: "exercise".into(),
            description: "walk 30min".into(),
            priority: 2,
            created_at: "2024/05/01".into(),
            updated_at: "2024/05/01".into(),
            ..Default::default()
        };

        let json = serde_json::to_value(doc.projection()).unwrap();
        assert_eq!(json["user_id"], "u1");
        assert_eq!(json["priority"], 2);
        assert_eq!(json["created_at"], "2024/05/01");
        assert!(json.get("metadata").is_none());
    }
}
