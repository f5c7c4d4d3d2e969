//! Document store interface
//!
//! The ingestion consumers and query services only see this narrow interface:
//! insert, point lookup, filtered scan, field-level update and delete over
//! named collections. Filters are plain equality or range predicates
//! (`$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`, `$in`, `$and`) on plain or
//! dotted field paths.
//!
//! Reads and updates never see soft-deleted documents; only `delete_one`
//! reaches them.

use bson::{doc, Document};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::error;

use crate::db::mongo::Schema;
use crate::db::schemas::IS_DELETED_FIELD;
use crate::types::Result;

/// Sorting and pagination for `find_many`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListOptions {
    /// Sort specification, e.g. `{ "metadata.created_at": -1 }`
    pub sort: Option<Document>,
    /// Number of matching documents to skip
    pub skip: u64,
    /// Maximum number of documents to return
    pub limit: Option<i64>,
}

impl ListOptions {
    pub fn sorted(sort: Document) -> Self {
        Self {
            sort: Some(sort),
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Add the "not soft-deleted" predicate to a filter
pub fn live_filter(filter: Document) -> Document {
    let mut full_filter = filter;
    full_filter.insert(IS_DELETED_FIELD, doc! { "$ne": true });
    full_filter
}

/// Durable document persistence
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document
    async fn insert_one(&self, collection: &str, document: Document) -> Result<()>;

    /// Find one live document by filter
    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>>;

    /// Find live documents by filter
    async fn find_many(
        &self,
        collection: &str,
        filter: Document,
        options: ListOptions,
    ) -> Result<Vec<Document>>;

    /// Set fields on one live document, returning the matched count
    async fn update_one(&self, collection: &str, filter: Document, patch: Document) -> Result<u64>;

    /// Mark one live document as deleted, returning the matched count
    async fn soft_delete(&self, collection: &str, filter: Document) -> Result<u64> {
        let now = bson::DateTime::now();
        self.update_one(
            collection,
            filter,
            doc! {
                "metadata.is_deleted": true,
                "metadata.deleted_at": now,
            },
        )
        .await
    }

    /// Remove one document, returning the deleted count
    async fn delete_one(&self, collection: &str, filter: Document) -> Result<u64>;
}

/// Typed view of one collection
pub struct TypedCollection<T> {
    store: Arc<dyn DocumentStore>,
    _schema: PhantomData<fn() -> T>,
}

impl<T> Clone for TypedCollection<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            _schema: PhantomData,
        }
    }
}

impl<T: Schema> TypedCollection<T> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _schema: PhantomData,
        }
    }

    /// Insert a document as-is (callers stamp metadata)
    pub async fn insert_one(&self, item: &T) -> Result<()> {
        let document = bson::to_document(item)?;
        self.store.insert_one(T::COLLECTION, document).await
    }

    pub async fn find_one(&self, filter: Document) -> Result<Option<T>> {
        match self.store.find_one(T::COLLECTION, filter).await? {
            Some(document) => Ok(Some(bson::from_document(document)?)),
            None => Ok(None),
        }
    }

    /// Find many documents; rows that fail to decode are logged and skipped
    pub async fn find_many(&self, filter: Document, options: ListOptions) -> Result<Vec<T>> {
        let documents = self.store.find_many(T::COLLECTION, filter, options).await?;

        Ok(documents
            .into_iter()
            .filter_map(|document| match bson::from_document(document) {
                Ok(item) => Some(item),
                Err(e) => {
                    error!("Error decoding {} document: {}", T::COLLECTION, e);
                    None
                }
            })
            .collect())
    }

    pub async fn soft_delete(&self, filter: Document) -> Result<u64> {
        self.store.soft_delete(T::COLLECTION, filter).await
    }
}
