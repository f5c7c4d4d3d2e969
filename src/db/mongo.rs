//! MongoDB client and document store

use bson::{doc, Document};
use futures_util::TryStreamExt;
use mongodb::{
    error::{ErrorKind, WriteFailure},
    options::{FindOptions, IndexOptions},
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info};

use crate::db::store::{live_filter, DocumentStore, ListOptions};
use crate::types::{HealthError, Result};

/// Server error code for a unique index violation
const DUPLICATE_KEY: i32 = 11000;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// A document type bound to its collection
pub trait Schema: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes {
    const COLLECTION: &'static str;
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Create a new MongoDB client
    pub async fn new(uri: &str, db_name: &str) -> Result<Self> {
        info!("Connecting to MongoDB at {}", uri);

        // Fail fast when MongoDB is unreachable instead of hanging on server selection
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| HealthError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| HealthError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get an untyped collection
    pub fn collection(&self, name: &str) -> Collection<Document> {
        self.client.database(&self.db_name).collection(name)
    }

    /// Apply schema-defined indexes to the schema's collection
    pub async fn apply_indexes<T: Schema>(&self) -> Result<()> {
        let schema_indices = T::into_indices();

        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.collection(T::COLLECTION)
            .create_indexes(indices)
            .await
            .map_err(|e| {
                HealthError::Database(format!(
                    "Failed to create indexes on {}: {}",
                    T::COLLECTION,
                    e
                ))
            })?;

        debug!("Indexes applied to {}", T::COLLECTION);
        Ok(())
    }
}

/// `DocumentStore` backed by MongoDB
#[derive(Clone)]
pub struct MongoDocumentStore {
    mongo: MongoClient,
}

impl MongoDocumentStore {
    pub fn new(mongo: MongoClient) -> Self {
        Self { mongo }
    }
}

#[async_trait::async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn insert_one(&self, collection: &str, document: Document) -> Result<()> {
        self.mongo
            .collection(collection)
            .insert_one(document)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    HealthError::Conflict(format!("Duplicate key in {}: {}", collection, e))
                } else {
                    HealthError::Database(format!("Insert into {} failed: {}", collection, e))
                }
            })?;
        Ok(())
    }

    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>> {
        self.mongo
            .collection(collection)
            .find_one(live_filter(filter))
            .await
            .map_err(|e| HealthError::Database(format!("Find in {} failed: {}", collection, e)))
    }

    async fn find_many(
        &self,
        collection: &str,
        filter: Document,
        options: ListOptions,
    ) -> Result<Vec<Document>> {
        let find_options = FindOptions::builder()
            .sort(options.sort)
            .skip(Some(options.skip).filter(|skip| *skip > 0))
            .limit(options.limit)
            .build();

        let cursor = self
            .mongo
            .collection(collection)
            .find(live_filter(filter))
            .with_options(find_options)
            .await
            .map_err(|e| HealthError::Database(format!("Find in {} failed: {}", collection, e)))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| HealthError::Database(format!("Cursor on {} failed: {}", collection, e)))
    }

    async fn update_one(&self, collection: &str, filter: Document, patch: Document) -> Result<u64> {
        let mut fields = patch;
        fields.insert("metadata.updated_at", bson::DateTime::now());

        let result = self
            .mongo
            .collection(collection)
            .update_one(live_filter(filter), doc! { "$set": fields })
            .await
            .map_err(|e| HealthError::Database(format!("Update in {} failed: {}", collection, e)))?;

        Ok(result.matched_count)
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> Result<u64> {
        let result = self
            .mongo
            .collection(collection)
            .delete_one(filter)
            .await
            .map_err(|e| HealthError::Database(format!("Delete in {} failed: {}", collection, e)))?;

        Ok(result.deleted_count)
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY
    )
}

#[cfg(test)]
mod tests {
    // Integration tests would require a running MongoDB instance; the
    // in-memory store covers DocumentStore semantics.
}
