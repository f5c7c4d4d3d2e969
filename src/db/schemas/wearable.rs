//! Wearable reading document schema
//!
//! Readings arrive only through the wearable ingestion queue. The reading id is
//! assigned by the producer and stored as-is.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, Schema};
use crate::db::schemas::Metadata;

/// Collection name for wearable readings
pub const WEARABLE_COLLECTION: &str = "wearable_data";

/// Wearable device reading stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct WearableDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Producer-supplied reading identifier
    pub id: String,

    pub user_id: String,

    /// Device family, e.g. "smartwatch"
    pub device_type: String,

    /// Measured quantity, e.g. "heart_rate"
    pub data_type: String,

    pub data_value: String,

    /// When the device took the reading, as reported by the producer
    pub recorded_timestamp: String,
}

impl IntoIndexes for WearableDoc {
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
            (
                doc! { "user_id": 1, "recorded_timestamp": -1 },
                Some(
                    IndexOptions::builder()
                        .name("user_recorded_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl Schema for WearableDoc {
    const COLLECTION: &'static str = WEARABLE_COLLECTION;
}
