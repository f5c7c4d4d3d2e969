//! Common metadata for all documents
//!
//! Tracks creation, update, and soft deletion timestamps. Every collection
//! uses the same typed soft-delete marker.

use bson::DateTime;
use serde::{Deserialize, Serialize};

/// Field path of the soft-delete flag inside a stored document
pub const IS_DELETED_FIELD: &str = "metadata.is_deleted";

/// Common metadata for all documents
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Metadata {
    /// Whether this document has been soft-deleted
    #[serde(default)]
    pub is_deleted: bool,

    /// When the document was soft-deleted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime>,

    /// When the document was last updated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,

    /// When the document was created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
}

impl Metadata {
    /// Create live metadata created and updated at `now`
    pub fn stamped(now: chrono::DateTime<chrono::Utc>) -> Self {
        let at = DateTime::from_chrono(now);
        Self {
            is_deleted: false,
            deleted_at: None,
            updated_at: Some(at),
            created_at: Some(at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_stamped_is_live() {
        let now = chrono::Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
        let metadata = Metadata::stamped(now);
        assert!(!metadata.is_deleted);
        assert!(metadata.deleted_at.is_none());
        assert_eq!(metadata.created_at, metadata.updated_at);
        assert_eq!(metadata.created_at.unwrap().to_chrono(), now);
    }

    #[test]
    fn test_missing_flag_defaults_to_live() {
        let metadata: Metadata = bson::from_document(bson::doc! {}).unwrap();
        assert!(!metadata.is_deleted);
    }
}
