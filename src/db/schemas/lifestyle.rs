//! Lifestyle entry document schema
//!
//! Nothing here writes these records; the schema is declared so startup
//! creates the collection's indexes alongside the ingested ones.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, Schema};
use crate::db::schemas::Metadata;

/// Collection name for lifestyle entries
pub const LIFESTYLE_COLLECTION: &str = "lifestyle_data";

/// Lifestyle entry (sleep, diet, activity) stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct LifestyleDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub id: String,
    pub user_id: String,
    pub data_type: String,
    pub data_value: String,
    pub recorded_date: String,
}

impl IntoIndexes for LifestyleDoc {
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
                doc! { "user_id": 1, "recorded_date": -1 },
                Some(
                    IndexOptions::builder()
                        .name("user_recorded_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl Schema for LifestyleDoc {
    const COLLECTION: &'static str = LIFESTYLE_COLLECTION;
}
