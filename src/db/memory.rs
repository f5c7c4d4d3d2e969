//! In-memory document store
//!
//! Evaluates the same filter subset the services send to MongoDB. Used by the
//! test suite and by dev mode when MongoDB is unreachable.

use bson::{Bson, Document};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::db::store::{live_filter, DocumentStore, ListOptions};
use crate::types::{HealthError, Result};

const UNIQUE_FIELD: &str = "id";

/// Simple in-memory document store
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    collections: Arc<RwLock<HashMap<String, Vec<Document>>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection, including soft-deleted ones
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Raw documents in a collection, including soft-deleted ones
    pub async fn raw(&self, collection: &str) -> Vec<Document> {
        self.collections
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert_one(&self, collection: &str, document: Document) -> Result<()> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();

        // Every collection carries a unique index on `id`, soft-deleted rows included
        if let Some(id) = document.get(UNIQUE_FIELD) {
            if docs.iter().any(|d| d.get(UNIQUE_FIELD) == Some(id)) {
                return Err(HealthError::Conflict(format!(
                    "Duplicate key in {}: {} {}",
                    collection, UNIQUE_FIELD, id
                )));
            }
        }

        docs.push(document);
        Ok(())
    }

    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>> {
        let filter = live_filter(filter);
        let collections = self.collections.read().await;

        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| matches(d, &filter)).cloned()))
    }

    async fn find_many(
        &self,
        collection: &str,
        filter: Document,
        options: ListOptions,
    ) -> Result<Vec<Document>> {
        let filter = live_filter(filter);
        let collections = self.collections.read().await;

        let mut found: Vec<Document> = collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| matches(d, &filter)).cloned().collect())
            .unwrap_or_default();

        if let Some(sort) = &options.sort {
            found.sort_by(|a, b| compare_by(a, b, sort));
        }

        let skipped = found.into_iter().skip(options.skip as usize);
        Ok(match options.limit {
            Some(limit) if limit > 0 => skipped.take(limit as usize).collect(),
            _ => skipped.collect(),
        })
    }

    async fn update_one(&self, collection: &str, filter: Document, patch: Document) -> Result<u64> {
        let filter = live_filter(filter);
        let mut collections = self.collections.write().await;

        let Some(target) = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| matches(d, &filter)))
        else {
            return Ok(0);
        };

        for (path, value) in patch {
            set_path(target, &path, value)?;
        }
        set_path(target, "metadata.updated_at", Bson::DateTime(bson::DateTime::now()))?;

        Ok(1)
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> Result<u64> {
        let mut collections = self.collections.write().await;

        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };

        match docs.iter().position(|d| matches(d, &filter)) {
            Some(index) => {
                docs.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

/// Resolve a dotted field path
fn get_path<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = document.get(parts.next()?)?;
    for part in parts {
        current = current.as_document()?.get(part)?;
    }
    Some(current)
}

/// Set a dotted field path, creating intermediate documents
fn set_path(document: &mut Document, path: &str, value: Bson) -> Result<()> {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            if !matches!(document.get(head), Some(Bson::Document(_))) {
                document.insert(head, Document::new());
            }
            match document.get_mut(head) {
                Some(Bson::Document(inner)) => set_path(inner, rest, value),
                _ => Err(HealthError::Internal(format!("cannot set field path {}", path))),
            }
        }
    }
}

/// Evaluate a filter against a document
fn matches(document: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, condition)| match key.as_str() {
        "$and" => match condition {
            Bson::Array(clauses) => clauses.iter().all(|clause| {
                clause
                    .as_document()
                    .map(|clause| matches(document, clause))
                    .unwrap_or(false)
            }),
            _ => false,
        },
        _ => field_matches(get_path(document, key), condition),
    })
}

fn is_operator_document(condition: &Bson) -> Option<&Document> {
    condition
        .as_document()
        .filter(|d| !d.is_empty() && d.keys().all(|k| k.starts_with('$')))
}

fn field_matches(value: Option<&Bson>, condition: &Bson) -> bool {
    let Some(operators) = is_operator_document(condition) else {
        return equals(value, condition);
    };

    operators.iter().all(|(op, operand)| match op.as_str() {
        "$eq" => equals(value, operand),
        "$ne" => !equals(value, operand),
        "$gt" => ordering(value, operand) == Some(Ordering::Greater),
        "$gte" => matches!(
            ordering(value, operand),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        "$lt" => ordering(value, operand) == Some(Ordering::Less),
        "$lte" => matches!(
            ordering(value, operand),
            Some(Ordering::Less | Ordering::Equal)
        ),
        "$in" => match operand {
            Bson::Array(candidates) => candidates.iter().any(|c| equals(value, c)),
            _ => false,
        },
        _ => false,
    })
}

fn equals(value: Option<&Bson>, expected: &Bson) -> bool {
    match value {
        None => matches!(expected, Bson::Null),
        Some(value) => compare(value, expected) == Some(Ordering::Equal) || value == expected,
    }
}

fn ordering(value: Option<&Bson>, operand: &Bson) -> Option<Ordering> {
    compare(value?, operand)
}

fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(*n as f64),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

/// Compare two values of the same kind; mixed kinds are unordered
fn compare(a: &Bson, b: &Bson) -> Option<Ordering> {
    match (a, b) {
        (Bson::String(a), Bson::String(b)) => Some(a.cmp(b)),
        (Bson::Boolean(a), Bson::Boolean(b)) => Some(a.cmp(b)),
        (Bson::DateTime(a), Bson::DateTime(b)) => Some(a.cmp(b)),
        _ => as_number(a)?.partial_cmp(&as_number(b)?),
    }
}

fn compare_by(a: &Document, b: &Document, sort: &Document) -> Ordering {
    for (field, direction) in sort {
        let descending = as_number(direction).map(|d| d < 0.0).unwrap_or(false);
        let ordering = match (get_path(a, field), get_path(b, field)) {
            (Some(x), Some(y)) => compare(x, y).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        let ordering = if descending { ordering.reverse() } else { ordering };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn reading(id: &str, user: &str, day: &str) -> Document {
        doc! {
            "id": id,
            "user_id": user,
            "created_at": day,
            "priority": 1,
            "metadata": { "is_deleted": false },
        }
    }

    #[tokio::test]
    async fn test_find_one_by_equality() {
        let store = MemoryDocumentStore::new();
        store.insert_one("c", reading("a", "u1", "2024/05/01")).await.unwrap();
        store.insert_one("c", reading("b", "u2", "2024/05/01")).await.unwrap();

        let found = store.find_one("c", doc! { "user_id": "u2" }).await.unwrap().unwrap();
        assert_eq!(found.get_str("id").unwrap(), "b");

        assert!(store.find_one("c", doc! { "user_id": "u3" }).await.unwrap().is_none());
        assert!(store.find_one("missing", doc! {}).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_range_filter_is_inclusive() {
        let store = MemoryDocumentStore::new();
        for (id, day) in [("a", "2024/04/30"), ("b", "2024/05/01"), ("c", "2024/05/07"), ("d", "2024/05/08")] {
            store.insert_one("c", reading(id, "u1", day)).await.unwrap();
        }

        let found = store
            .find_many(
                "c",
                doc! { "user_id": "u1", "created_at": { "$gte": "2024/05/01", "$lte": "2024/05/07" } },
                ListOptions::default(),
            )
            .await
            .unwrap();

        let ids: Vec<&str> = found.iter().map(|d| d.get_str("id").unwrap()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_soft_deleted_documents_are_hidden() {
        let store = MemoryDocumentStore::new();
        store.insert_one("c", reading("a", "u1", "2024/05/01")).await.unwrap();

        let matched = store.soft_delete("c", doc! { "id": "a" }).await.unwrap();
        assert_eq!(matched, 1);

        assert!(store.find_one("c", doc! { "id": "a" }).await.unwrap().is_none());
        // A second soft delete no longer matches
        assert_eq!(store.soft_delete("c", doc! { "id": "a" }).await.unwrap(), 0);

        let raw = store.raw("c").await;
        let metadata = raw[0].get_document("metadata").unwrap();
        assert!(metadata.get_bool("is_deleted").unwrap());
        assert!(metadata.get_datetime("deleted_at").is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_id_is_a_conflict() {
        let store = MemoryDocumentStore::new();
        store.insert_one("c", reading("a", "u1", "2024/05/01")).await.unwrap();
        store.soft_delete("c", doc! { "id": "a" }).await.unwrap();

        let err = store
            .insert_one("c", reading("a", "u2", "2024/05/02"))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.count("c").await, 1);

        // Same id in another collection is fine
        store.insert_one("other", reading("a", "u1", "2024/05/01")).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_sets_dotted_paths() {
        let store = MemoryDocumentStore::new();
        store.insert_one("c", reading("a", "u1", "2024/05/01")).await.unwrap();

        let matched = store
            .update_one("c", doc! { "id": "a" }, doc! { "priority": 5, "extra.note": "x" })
            .await
            .unwrap();
        assert_eq!(matched, 1);

        let found = store.find_one("c", doc! { "id": "a" }).await.unwrap().unwrap();
        assert_eq!(found.get_i32("priority").unwrap(), 5);
        assert_eq!(found.get_document("extra").unwrap().get_str("note").unwrap(), "x");
        assert!(found
            .get_document("metadata")
            .unwrap()
            .get_datetime("updated_at")
            .is_ok());

        let missed = store
            .update_one("c", doc! { "id": "zzz" }, doc! { "priority": 9 })
            .await
            .unwrap();
        assert_eq!(missed, 0);
    }

    #[tokio::test]
    async fn test_delete_one_removes_document() {
        let store = MemoryDocumentStore::new();
        store.insert_one("c", reading("a", "u1", "2024/05/01")).await.unwrap();
        store.insert_one("c", reading("b", "u1", "2024/05/01")).await.unwrap();

        assert_eq!(store.delete_one("c", doc! { "id": "a" }).await.unwrap(), 1);
        assert_eq!(store.delete_one("c", doc! { "id": "a" }).await.unwrap(), 0);
        assert_eq!(store.count("c").await, 1);
    }

    #[tokio::test]
    async fn test_sort_skip_limit() {
        let store = MemoryDocumentStore::new();
        for (id, priority) in [("a", 3), ("b", 1), ("c", 2)] {
            let mut d = reading(id, "u1", "2024/05/01");
            d.insert("priority", priority);
            store.insert_one("c", d).await.unwrap();
        }

        let found = store
            .find_many(
                "c",
                doc! {},
                ListOptions {
                    sort: Some(doc! { "priority": -1 }),
                    skip: 1,
                    limit: Some(1),
                },
            )
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get_str("id").unwrap(), "c");
    }

    #[test]
    fn test_numeric_equality_across_widths() {
        let d = doc! { "priority": 2_i64 };
        assert!(matches(&d, &doc! { "priority": 2_i32 }));
        assert!(matches(&d, &doc! { "priority": { "$in": [1, 2] } }));
        assert!(!matches(&d, &doc! { "priority": { "$gt": 2 } }));
    }

    #[test]
    fn test_and_clauses() {
        let d = doc! { "user_id": "u1", "created_at": "2024/05/01" };
        assert!(matches(
            &d,
            &doc! { "$and": [ { "user_id": "u1" }, { "created_at": "2024/05/01" } ] }
        ));
        assert!(!matches(
            &d,
            &doc! { "$and": [ { "user_id": "u1" }, { "created_at": "2024/05/02" } ] }
        ));
    }
}
