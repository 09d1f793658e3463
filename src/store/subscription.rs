//! Subscription handles for store queries and single documents.
//!
//! A handle is owned by the view that created it and torn down by dropping
//! it. Delivery is push-driven: `next()` resolves immediately with the
//! initial value, then once per change for the subscription's lifetime.
//! Because every delivery is a full snapshot read at delivery time, a lagged
//! subscriber loses nothing by skipping intermediate states.

use std::sync::Arc;

use tokio::sync::broadcast;

use super::{Document, DocumentStore};

/// Live handle on an ordered collection query.
pub struct QuerySubscription {
    store: Arc<DocumentStore>,
    collection: String,
    order_by: String,
    changes: broadcast::Receiver<()>,
    delivered_initial: bool,
}

impl QuerySubscription {
    pub(super) fn new(
        store: Arc<DocumentStore>,
        collection: &str,
        order_by: &str,
        changes: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            store,
            collection: collection.to_string(),
            order_by: order_by.to_string(),
            changes,
            delivered_initial: false,
        }
    }

    /// Next full sorted snapshot. Returns `None` only if the store side of
    /// the change channel is gone, which cannot happen while this handle
    /// holds the store alive.
    pub async fn next(&mut self) -> Option<Vec<Document>> {
        if !self.delivered_initial {
            self.delivered_initial = true;
            return Some(self.snapshot().await);
        }
        match self.changes.recv().await {
            Ok(()) => Some(self.snapshot().await),
            // Lagged: intermediate notifications were dropped, but the
            // snapshot we read now already reflects them.
            Err(broadcast::error::RecvError::Lagged(_)) => Some(self.snapshot().await),
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }

    async fn snapshot(&self) -> Vec<Document> {
        self.store
            .query_ordered(&self.collection, &self.order_by)
            .await
    }
}

/// Live handle on a single document. The inner `Option` is the document's
/// existence: `Some(doc)` when present, `None` when absent.
pub struct DocumentSubscription {
    store: Arc<DocumentStore>,
    collection: String,
    id: String,
    changes: broadcast::Receiver<()>,
    delivered_initial: bool,
}

impl DocumentSubscription {
    pub(super) fn new(
        store: Arc<DocumentStore>,
        collection: &str,
        id: &str,
        changes: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            store,
            collection: collection.to_string(),
            id: id.to_string(),
            changes,
            delivered_initial: false,
        }
    }

    pub async fn next(&mut self) -> Option<Option<Document>> {
        if !self.delivered_initial {
            self.delivered_initial = true;
            return Some(self.snapshot().await);
        }
        match self.changes.recv().await {
            Ok(()) => Some(self.snapshot().await),
            Err(broadcast::error::RecvError::Lagged(_)) => Some(self.snapshot().await),
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }

    async fn snapshot(&self) -> Option<Document> {
        self.store.get(&self.collection, &self.id).await
    }
}
