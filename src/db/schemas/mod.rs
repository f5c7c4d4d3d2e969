//! Database schemas
//!
//! Defines MongoDB document structures for medical records, lifestyle
//! entries, wearable readings and health recommendations.

mod lifestyle;
mod medical_record;
mod metadata;
mod recommendation;
mod wearable;

pub use lifestyle::{LifestyleDoc, LIFESTYLE_COLLECTION};
pub use medical_record::{MedicalRecordDoc, MEDICAL_RECORD_COLLECTION};
pub use metadata::{Metadata, IS_DELETED_FIELD};
pub use recommendation::{
    RecommendationDoc, RecommendationProjection, RECOMMENDATION_COLLECTION,
};
pub use wearable::{WearableDoc, WEARABLE_COLLECTION};
