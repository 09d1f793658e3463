//! Document store - named collections of JSON documents with real-time
//! change notification.
//!
//! This is the storage the rest of the crate builds on: independent
//! JSON-object documents grouped into collections, queryable with a
//! numeric-field sort, subscribable (every change re-delivers a full
//! snapshot, never a delta), with merge updates and an atomic multi-document
//! batch write.

pub mod subscription;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

pub use subscription::{DocumentSubscription, QuerySubscription};

/// Capacity of the per-collection change channel. Subscribers that lag simply
/// re-read the current snapshot, so a small buffer is enough.
const CHANGE_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document {collection}/{id} not found")]
    NotFound { collection: String, id: String },
    #[error("batch write is empty")]
    EmptyBatch,
}

/// A document together with its store-assigned id.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Map<String, Value>,
}

/// One mutation inside an atomic batch. Only merge updates are batched; that
/// is the only multi-document write the sync core needs.
#[derive(Debug, Clone)]
pub struct BatchUpdate {
    pub collection: String,
    pub id: String,
    pub patch: Map<String, Value>,
}

struct Collection {
    docs: HashMap<String, Map<String, Value>>,
    changes: broadcast::Sender<()>,
}

impl Collection {
    fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            docs: HashMap::new(),
            changes,
        }
    }

    fn notify(&self) {
        // No receivers is fine; nobody is watching this collection.
        let _ = self.changes.send(());
    }
}

/// In-process document store shared by every session of the site.
///
/// All mutations take the write lock for their full duration, which is what
/// makes the batch write atomic: a subscriber can never observe a partially
/// applied batch, and a failed batch changes nothing.
pub struct DocumentStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl DocumentStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            collections: RwLock::new(HashMap::new()),
        })
    }

    /// Create a document with a store-assigned id. Returns the new id.
    pub async fn create(&self, collection: &str, data: Map<String, Value>) -> String {
        let id = Uuid::new_v4().to_string();
        let mut collections = self.collections.write().await;
        let coll = collections
            .entry(collection.to_string())
            .or_insert_with(Collection::new);
        coll.docs.insert(id.clone(), data);
        coll.notify();
        id
    }

    /// Write a document at a caller-chosen id, replacing any existing data.
    pub async fn set(&self, collection: &str, id: &str, data: Map<String, Value>) {
        let mut collections = self.collections.write().await;
        let coll = collections
            .entry(collection.to_string())
            .or_insert_with(Collection::new);
        coll.docs.insert(id.to_string(), data);
        coll.notify();
    }

    /// Merge `patch` into an existing document. Keys present in the patch are
    /// overwritten; everything else is left untouched. Fails when the
    /// document does not exist.
    pub async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let coll = collections
            .entry(collection.to_string())
            .or_insert_with(Collection::new);
        let doc = coll.docs.get_mut(id).ok_or_else(|| StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        })?;
        for (key, value) in patch {
            doc.insert(key, value);
        }
        coll.notify();
        Ok(())
    }

    /// Delete a document. Deleting an absent document is a no-op, so deletes
    /// are idempotent; subscribers are only notified when something changed.
    pub async fn delete(&self, collection: &str, id: &str) {
        let mut collections = self.collections.write().await;
        if let Some(coll) = collections.get_mut(collection) {
            if coll.docs.remove(id).is_some() {
                coll.notify();
            }
        }
    }

    pub async fn get(&self, collection: &str, id: &str) -> Option<Document> {
        let collections = self.collections.read().await;
        collections
            .get(collection)?
            .docs
            .get(id)
            .map(|data| Document {
                id: id.to_string(),
                data: data.clone(),
            })
    }

    /// Full collection snapshot sorted ascending by the numeric field
    /// `order_by`. A missing or non-numeric field sorts as 0; ties break by
    /// document id (the store-defined secondary order).
    pub async fn query_ordered(&self, collection: &str, order_by: &str) -> Vec<Document> {
        let collections = self.collections.read().await;
        let Some(coll) = collections.get(collection) else {
            return Vec::new();
        };
        let mut docs: Vec<Document> = coll
            .docs
            .iter()
            .map(|(id, data)| Document {
                id: id.clone(),
                data: data.clone(),
            })
            .collect();
        docs.sort_by(|a, b| {
            let ka = sort_key(&a.data, order_by);
            let kb = sort_key(&b.data, order_by);
            ka.cmp(&kb).then_with(|| a.id.cmp(&b.id))
        });
        docs
    }

    /// Apply several merge updates atomically: either every document is
    /// updated or none is. Validation happens under the same write lock as
    /// the mutation, so no interleaved write can invalidate it.
    pub async fn update_batch(&self, updates: Vec<BatchUpdate>) -> Result<(), StoreError> {
        if updates.is_empty() {
            return Err(StoreError::EmptyBatch);
        }
        let mut collections = self.collections.write().await;

        for update in &updates {
            let exists = collections
                .get(&update.collection)
                .map(|coll| coll.docs.contains_key(&update.id))
                .unwrap_or(false);
            if !exists {
                return Err(StoreError::NotFound {
                    collection: update.collection.clone(),
                    id: update.id.clone(),
                });
            }
        }

        let mut touched: Vec<String> = Vec::new();
        for update in updates {
            // Existence was checked above; the lock has not been released.
            if let Some(coll) = collections.get_mut(&update.collection) {
                if let Some(doc) = coll.docs.get_mut(&update.id) {
                    for (key, value) in update.patch {
                        doc.insert(key, value);
                    }
                }
            }
            if !touched.contains(&update.collection) {
                touched.push(update.collection);
            }
        }
        for name in touched {
            if let Some(coll) = collections.get(&name) {
                coll.notify();
            }
        }
        Ok(())
    }

    /// Subscribe to an ordered collection query. The first `next()` resolves
    /// immediately with the current snapshot; afterwards every change to the
    /// collection re-delivers the complete, newly-sorted snapshot.
    pub async fn subscribe_query(
        self: &Arc<Self>,
        collection: &str,
        order_by: &str,
    ) -> QuerySubscription {
        let rx = self.change_receiver(collection).await;
        QuerySubscription::new(self.clone(), collection, order_by, rx)
    }

    /// Subscribe to a single document. The first `next()` resolves
    /// immediately with the current value (`None` when absent).
    pub async fn subscribe_document(
        self: &Arc<Self>,
        collection: &str,
        id: &str,
    ) -> DocumentSubscription {
        let rx = self.change_receiver(collection).await;
        DocumentSubscription::new(self.clone(), collection, id, rx)
    }

    async fn change_receiver(&self, collection: &str) -> broadcast::Receiver<()> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_insert_with(Collection::new)
            .changes
            .subscribe()
    }
}

fn sort_key(data: &Map<String, Value>, field: &str) -> i64 {
    data.get(field).and_then(Value::as_i64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(fields: &[(&str, Value)]) -> Map<String, Value> {
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let store = DocumentStore::new();
        let id = store.create("artworks", doc(&[("order", json!(1))])).await;
        let fetched = store.get("artworks", &id).await.unwrap();
        assert_eq!(fetched.data["order"], json!(1));
    }

    #[tokio::test]
    async fn test_update_merges_only_patch_keys() {
        let store = DocumentStore::new();
        let id = store
            .create("artworks", doc(&[("title", json!("a")), ("order", json!(1))]))
            .await;
        store
            .update("artworks", &id, doc(&[("order", json!(5))]))
            .await
            .unwrap();
        let fetched = store.get("artworks", &id).await.unwrap();
        assert_eq!(fetched.data["title"], json!("a"));
        assert_eq!(fetched.data["order"], json!(5));
    }

    #[tokio::test]
    async fn test_update_missing_document_fails() {
        let store = DocumentStore::new();
        let err = store
            .update("artworks", "nope", doc(&[("order", json!(1))]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = DocumentStore::new();
        let id = store.create("artworks", doc(&[])).await;
        store.delete("artworks", &id).await;
        store.delete("artworks", &id).await;
        assert!(store.get("artworks", &id).await.is_none());
    }

    #[tokio::test]
    async fn test_query_orders_by_field_then_id() {
        let store = DocumentStore::new();
        store.set("artworks", "b", doc(&[("order", json!(2))])).await;
        store.set("artworks", "c", doc(&[("order", json!(1))])).await;
        store.set("artworks", "a", doc(&[("order", json!(2))])).await;
        let docs = store.query_ordered("artworks", "order").await;
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_query_treats_missing_order_as_zero() {
        let store = DocumentStore::new();
        store.set("artworks", "z", doc(&[])).await;
        store.set("artworks", "a", doc(&[("order", json!(1))])).await;
        let docs = store.query_ordered("artworks", "order").await;
        assert_eq!(docs[0].id, "z");
        assert_eq!(docs[1].id, "a");
    }

    #[tokio::test]
    async fn test_batch_update_applies_all() {
        let store = DocumentStore::new();
        store.set("artworks", "a", doc(&[("order", json!(0))])).await;
        store.set("artworks", "b", doc(&[("order", json!(1))])).await;
        store
            .update_batch(vec![
                BatchUpdate {
                    collection: "artworks".to_string(),
                    id: "a".to_string(),
                    patch: doc(&[("order", json!(1))]),
                },
                BatchUpdate {
                    collection: "artworks".to_string(),
                    id: "b".to_string(),
                    patch: doc(&[("order", json!(0))]),
                },
            ])
            .await
            .unwrap();
        let docs = store.query_ordered("artworks", "order").await;
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_batch_update_is_all_or_nothing() {
        let store = DocumentStore::new();
        store.set("artworks", "a", doc(&[("order", json!(0))])).await;
        let before = store.query_ordered("artworks", "order").await;
        let err = store
            .update_batch(vec![
                BatchUpdate {
                    collection: "artworks".to_string(),
                    id: "a".to_string(),
                    patch: doc(&[("order", json!(9))]),
                },
                BatchUpdate {
                    collection: "artworks".to_string(),
                    id: "missing".to_string(),
                    patch: doc(&[("order", json!(1))]),
                },
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        // Round-trip: read-before equals read-after.
        let after = store.query_ordered("artworks", "order").await;
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_empty_batch_is_rejected() {
        let store = DocumentStore::new();
        assert!(matches!(
            store.update_batch(vec![]).await,
            Err(StoreError::EmptyBatch)
        ));
    }

    #[tokio::test]
    async fn test_subscription_delivers_initial_snapshot() {
        let store = DocumentStore::new();
        store.set("artworks", "a", doc(&[("order", json!(0))])).await;
        let mut sub = store.subscribe_query("artworks", "order").await;
        let snapshot = sub.next().await.unwrap();
        assert_eq!(snapshot.len(), 1);
    }

    #[tokio::test]
    async fn test_subscription_redelivers_full_snapshot_on_change() {
        let store = DocumentStore::new();
        let mut sub = store.subscribe_query("artworks", "order").await;
        assert!(sub.next().await.unwrap().is_empty());

        store.set("artworks", "a", doc(&[("order", json!(1))])).await;
        let snapshot = sub.next().await.unwrap();
        assert_eq!(snapshot.len(), 1);

        store.set("artworks", "b", doc(&[("order", json!(0))])).await;
        let snapshot = sub.next().await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].id, "b");
    }

    #[tokio::test]
    async fn test_document_subscription_tracks_existence() {
        let store = DocumentStore::new();
        let mut sub = store.subscribe_document("about", "content").await;
        assert!(sub.next().await.unwrap().is_none());

        store.set("about", "content", doc(&[("bio", json!("hi"))])).await;
        let value = sub.next().await.unwrap().unwrap();
        assert_eq!(value.data["bio"], json!("hi"));

        store.delete("about", "content").await;
        assert!(sub.next().await.unwrap().is_none());
    }
}
