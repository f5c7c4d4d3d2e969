//! Medical record document schema
//!
//! Nothing here writes these records; the schema is declared so startup
//! creates the collection's indexes alongside the ingested ones.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, Schema};
use crate::db::schemas::Metadata;

/// Collection name for medical records
pub const MEDICAL_RECORD_COLLECTION: &str = "medical_records";

/// Medical record stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct MedicalRecordDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    pub id: String,
    pub user_id: String,
    pub record_type: String,
    pub record_date: String,
    pub description: String,
    pub doctor_id: String,

    /// References to stored attachments (scans, lab reports)
    #[serde(default)]
    pub attachments: Vec<String>,
}

impl IntoIndexes for MedicalRecordDoc {
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
                doc! { "user_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("user_id_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl Schema for MedicalRecordDoc {
    const COLLECTION: &'static str = MEDICAL_RECORD_COLLECTION;
}
