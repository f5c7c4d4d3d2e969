//! Database layer
//!
//! MongoDB is the durable store for every record kind. Services reach it
//! through the `DocumentStore` trait so the in-memory store can stand in for
//! tests and dev mode.

pub mod memory;
pub mod mongo;
pub mod schemas;
pub mod store;

pub use memory::MemoryDocumentStore;
pub use mongo::{IntoIndexes, MongoClient, MongoDocumentStore, Schema};
pub use store::{live_filter, DocumentStore, ListOptions, TypedCollection};

use schemas::{LifestyleDoc, MedicalRecordDoc, RecommendationDoc, WearableDoc};

/// Apply the indexes of every collection this service owns
///
/// Medical and lifestyle records share the database but are written
/// elsewhere; only their indexes are managed here.
pub async fn apply_all_indexes(mongo: &MongoClient) -> crate::types::Result<()> {
    mongo.apply_indexes::<MedicalRecordDoc>().await?;
    mongo.apply_indexes::<LifestyleDoc>().await?;
    mongo.apply_indexes::<WearableDoc>().await?;
    mongo.apply_indexes::<RecommendationDoc>().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn has_unique_id<T: IntoIndexes>() -> bool {
        T::into_indices().iter().any(|(keys, options)| {
            *keys == doc! { "id": 1 }
                && options.as_ref().and_then(|o| o.unique) == Some(true)
        })
    }

    #[test]
    fn test_every_managed_collection_has_unique_id() {
        assert!(has_unique_id::<MedicalRecordDoc>());
        assert!(has_unique_id::<LifestyleDoc>());
        assert!(has_unique_id::<WearableDoc>());
        assert!(has_unique_id::<RecommendationDoc>());
    }
}
