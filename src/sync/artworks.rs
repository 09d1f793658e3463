//! Artwork collection sync.
//!
//! The gallery is the `artworks` collection sorted by `order` ascending.
//! Create appends at max+1; reorder renumbers the whole collection 0..N-1 in
//! one atomic batch; delete never renumbers siblings. The local view state
//! is updated optimistically before each write resolves and rolled back to
//! the pre-write snapshot when the store rejects it.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::blob::{BlobStore, ImageFile};
use crate::models::Artwork;
use crate::store::{BatchUpdate, Document, DocumentStore, QuerySubscription};

use super::optimistic::EditState;
use super::SyncError;

pub const ARTWORKS_COLLECTION: &str = "artworks";
const ORDER_FIELD: &str = "order";

pub struct ArtworkSync {
    store: Arc<DocumentStore>,
    blobs: Arc<BlobStore>,
    view: RwLock<EditState<Vec<Artwork>>>,
}

impl ArtworkSync {
    pub fn new(store: Arc<DocumentStore>, blobs: Arc<BlobStore>) -> Self {
        Self {
            store,
            blobs,
            view: RwLock::new(EditState::new(Vec::new())),
        }
    }

    /// Current full ordered list; `exclude_id` removes one artwork after
    /// sorting (used by the detail page's "more works" rail).
    pub async fn list(&self, exclude_id: Option<&str>) -> Vec<Artwork> {
        let docs = self
            .store
            .query_ordered(ARTWORKS_COLLECTION, ORDER_FIELD)
            .await;
        docs_to_artworks(docs, exclude_id)
    }

    pub async fn get(&self, id: &str) -> Option<Artwork> {
        let doc = self.store.get(ARTWORKS_COLLECTION, id).await?;
        Artwork::from_document(doc)
    }

    /// Subscribe to the gallery. Each change re-delivers the complete,
    /// newly-sorted, filtered list.
    pub async fn subscribe(&self, exclude_id: Option<String>) -> ArtworkFeed {
        let inner = self
            .store
            .subscribe_query(ARTWORKS_COLLECTION, ORDER_FIELD)
            .await;
        ArtworkFeed { inner, exclude_id }
    }

    /// Upload the image, then create the document appended at the end of the
    /// current order. An upload failure aborts with no document created.
    /// The read-max/create pair is not atomic against concurrent creators;
    /// accepted for a single-admin site.
    pub async fn create(
        &self,
        title: &str,
        description: &str,
        image: ImageFile,
    ) -> Result<Artwork, SyncError> {
        let image_url = self.blobs.store_artwork_image(&image).await?;

        let current = self.list(None).await;
        let max_order = current.iter().map(|a| a.order).max().unwrap_or(0);

        let mut artwork = Artwork {
            id: String::new(),
            title: title.to_string(),
            description: description.to_string(),
            image_url,
            order: max_order + 1,
            created_at: Utc::now(),
        };
        let id = self
            .store
            .create(ARTWORKS_COLLECTION, artwork.to_data())
            .await;
        artwork.id = id;

        tracing::info!(id = %artwork.id, order = artwork.order, "artwork created");
        self.settle_view().await;
        Ok(artwork)
    }

    /// Overwrite title/description (empty string when absent) and, only when
    /// a new image is supplied, replace the image.
    pub async fn update(
        &self,
        id: &str,
        title: &str,
        description: &str,
        image: Option<ImageFile>,
    ) -> Result<Artwork, SyncError> {
        if self.store.get(ARTWORKS_COLLECTION, id).await.is_none() {
            return Err(SyncError::NotFound);
        }

        let mut patch = Map::new();
        patch.insert("title".to_string(), Value::String(title.to_string()));
        patch.insert(
            "description".to_string(),
            Value::String(description.to_string()),
        );
        if let Some(image) = image {
            let image_url = self.blobs.store_artwork_image(&image).await?;
            patch.insert("imageUrl".to_string(), Value::String(image_url));
        }

        self.store.update(ARTWORKS_COLLECTION, id, patch).await?;
        tracing::info!(id = %id, "artwork updated");
        self.settle_view().await;

        self.get(id).await.ok_or(SyncError::NotFound)
    }

    /// Remove one document. Sibling `order` values are left alone; gaps are
    /// tolerated since sort order, not contiguity, is the invariant.
    pub async fn delete(&self, id: &str) -> Result<(), SyncError> {
        if self.store.get(ARTWORKS_COLLECTION, id).await.is_none() {
            return Err(SyncError::NotFound);
        }
        self.store.delete(ARTWORKS_COLLECTION, id).await;
        tracing::info!(id = %id, "artwork deleted");
        self.settle_view().await;
        Ok(())
    }

    /// Apply a new full ordering: `order = index` for every id, written as
    /// one all-or-nothing batch. The local view switches to the new order
    /// before the write and reverts to the pre-drag snapshot on failure.
    pub async fn reorder(&self, ids: &[String]) -> Result<Vec<Artwork>, SyncError> {
        let current = self.list(None).await;
        validate_reorder(ids, &current)?;

        let mut reordered = Vec::with_capacity(ids.len());
        for (index, id) in ids.iter().enumerate() {
            // Unknown ids survive validation only in a concurrent-delete
            // race; the batch write below catches them atomically.
            if let Some(mut artwork) = current.iter().find(|a| &a.id == id).cloned() {
                artwork.order = index as i64;
                reordered.push(artwork);
            }
        }

        {
            let mut view = self.view.write().await;
            view.confirm(current.clone());
            view.begin(reordered.clone());
        }

        let updates = ids
            .iter()
            .enumerate()
            .map(|(index, id)| {
                let mut patch = Map::new();
                patch.insert(ORDER_FIELD.to_string(), Value::from(index as i64));
                BatchUpdate {
                    collection: ARTWORKS_COLLECTION.to_string(),
                    id: id.clone(),
                    patch,
                }
            })
            .collect();

        match self.store.update_batch(updates).await {
            Ok(()) => {
                let mut view = self.view.write().await;
                view.confirm(reordered.clone());
                tracing::info!(count = ids.len(), "gallery reordered");
                Ok(reordered)
            }
            Err(e) => {
                let mut view = self.view.write().await;
                let restored = view.roll_back();
                tracing::warn!(error = %e, restored = restored.len(), "reorder failed, view rolled back");
                Err(e.into())
            }
        }
    }

    /// The list a caller should currently see: the optimistic order while a
    /// reorder is in flight, the settled store order otherwise.
    #[cfg(test)]
    async fn view_snapshot(&self) -> Vec<Artwork> {
        let view = self.view.read().await;
        if view.is_pending() {
            return view.current().clone();
        }
        drop(view);
        self.list(None).await
    }

    async fn settle_view(&self) {
        let list = self.list(None).await;
        self.view.write().await.confirm(list);
    }
}

/// Feed of full gallery snapshots. Exclusion is applied after sorting.
pub struct ArtworkFeed {
    inner: QuerySubscription,
    exclude_id: Option<String>,
}

impl ArtworkFeed {
    pub async fn next(&mut self) -> Option<Vec<Artwork>> {
        let docs = self.inner.next().await?;
        Some(docs_to_artworks(docs, self.exclude_id.as_deref()))
    }
}

fn docs_to_artworks(docs: Vec<Document>, exclude_id: Option<&str>) -> Vec<Artwork> {
    docs.into_iter()
        .filter_map(Artwork::from_document)
        .filter(|artwork| exclude_id != Some(artwork.id.as_str()))
        .collect()
}

fn validate_reorder(ids: &[String], current: &[Artwork]) -> Result<(), SyncError> {
    if ids.is_empty() {
        return Err(SyncError::Validation("no ids to reorder".to_string()));
    }
    for (i, id) in ids.iter().enumerate() {
        if ids[..i].contains(id) {
            return Err(SyncError::Validation(format!("duplicate id: {id}")));
        }
    }
    if ids.len() != current.len() {
        return Err(SyncError::Validation(format!(
            "expected {} ids, got {}",
            current.len(),
            ids.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::tests::png_image;
    use crate::sync::test_support::fresh_core;

    #[tokio::test]
    async fn test_create_appends_with_increasing_order() {
        let core = fresh_core();
        let a = core.artworks.create("A", "", png_image("a.png")).await.unwrap();
        let b = core.artworks.create("B", "", png_image("b.png")).await.unwrap();
        let c = core.artworks.create("C", "", png_image("c.png")).await.unwrap();
        assert_eq!(a.order, 1);
        assert_eq!(b.order, 2);
        assert_eq!(c.order, 3);
        assert!(a.order < b.order && b.order < c.order);
    }

    #[tokio::test]
    async fn test_failed_upload_creates_no_document() {
        let core = fresh_core();
        let bad = ImageFile {
            file_name: "x.txt".to_string(),
            bytes: b"not an image".to_vec(),
        };
        assert!(core.artworks.create("X", "", bad).await.is_err());
        assert!(core.artworks.list(None).await.is_empty());
    }

    #[tokio::test]
    async fn test_list_is_sorted_and_exclusion_applies_after_sort() {
        let core = fresh_core();
        let a = core.artworks.create("A", "", png_image("a.png")).await.unwrap();
        let b = core.artworks.create("B", "", png_image("b.png")).await.unwrap();
        let c = core.artworks.create("C", "", png_image("c.png")).await.unwrap();

        let all = core.artworks.list(None).await;
        assert_eq!(
            all.iter().map(|x| x.id.clone()).collect::<Vec<_>>(),
            vec![a.id.clone(), b.id.clone(), c.id.clone()]
        );

        let rail = core.artworks.list(Some(&b.id)).await;
        assert_eq!(
            rail.iter().map(|x| x.id.clone()).collect::<Vec<_>>(),
            vec![a.id, c.id]
        );
    }

    #[tokio::test]
    async fn test_update_keeps_image_when_none_supplied() {
        let core = fresh_core();
        let a = core.artworks.create("A", "old", png_image("a.png")).await.unwrap();
        let updated = core.artworks.update(&a.id, "", "new", None).await.unwrap();
        assert_eq!(updated.title, "");
        assert_eq!(updated.description, "new");
        assert_eq!(updated.image_url, a.image_url);
        assert_eq!(updated.created_at, a.created_at);
    }

    #[tokio::test]
    async fn test_update_replaces_image_when_supplied() {
        let core = fresh_core();
        let a = core.artworks.create("A", "", png_image("a.png")).await.unwrap();
        let updated = core
            .artworks
            .update(&a.id, "A", "", Some(png_image("b.png")))
            .await
            .unwrap();
        assert_ne!(updated.image_url, a.image_url);
    }

    #[tokio::test]
    async fn test_delete_leaves_sibling_order_untouched() {
        let core = fresh_core();
        let a = core.artworks.create("A", "", png_image("a.png")).await.unwrap();
        let b = core.artworks.create("B", "", png_image("b.png")).await.unwrap();
        let c = core.artworks.create("C", "", png_image("c.png")).await.unwrap();

        core.artworks.delete(&b.id).await.unwrap();
        let left = core.artworks.list(None).await;
        assert_eq!(left.len(), 2);
        // Gap in order values is expected and fine.
        assert_eq!(left[0].id, a.id);
        assert_eq!(left[0].order, 1);
        assert_eq!(left[1].id, c.id);
        assert_eq!(left[1].order, 3);
    }

    #[tokio::test]
    async fn test_delete_unknown_is_not_found() {
        let core = fresh_core();
        assert!(matches!(
            core.artworks.delete("missing").await,
            Err(SyncError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_reorder_renumbers_dense_from_zero() {
        let core = fresh_core();
        let a = core.artworks.create("A", "", png_image("a.png")).await.unwrap();
        let b = core.artworks.create("B", "", png_image("b.png")).await.unwrap();

        let new_order = vec![b.id.clone(), a.id.clone()];
        core.artworks.reorder(&new_order).await.unwrap();

        let list = core.artworks.list(None).await;
        assert_eq!(list[0].id, b.id);
        assert_eq!(list[0].order, 0);
        assert_eq!(list[1].id, a.id);
        assert_eq!(list[1].order, 1);
    }

    #[tokio::test]
    async fn test_failed_reorder_leaves_store_unchanged_and_rolls_back_view() {
        let core = fresh_core();
        let a = core.artworks.create("A", "", png_image("a.png")).await.unwrap();
        let b = core.artworks.create("B", "", png_image("b.png")).await.unwrap();
        let before = core.artworks.list(None).await;

        // Same length as the collection, but one id no longer exists: the
        // batch fails atomically.
        let stale = vec![b.id.clone(), "deleted-elsewhere".to_string()];
        assert!(core.artworks.reorder(&stale).await.is_err());

        let after = core.artworks.list(None).await;
        assert_eq!(before, after);

        let view = core.artworks.view_snapshot().await;
        assert_eq!(
            view.iter().map(|x| x.id.clone()).collect::<Vec<_>>(),
            vec![a.id, b.id]
        );
    }

    #[tokio::test]
    async fn test_reorder_rejects_duplicates_and_wrong_length() {
        let core = fresh_core();
        let a = core.artworks.create("A", "", png_image("a.png")).await.unwrap();
        let _b = core.artworks.create("B", "", png_image("b.png")).await.unwrap();

        let dup = vec![a.id.clone(), a.id.clone()];
        assert!(matches!(
            core.artworks.reorder(&dup).await,
            Err(SyncError::Validation(_))
        ));

        let short = vec![a.id.clone()];
        assert!(matches!(
            core.artworks.reorder(&short).await,
            Err(SyncError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_full_scenario_create_create_reorder() {
        let core = fresh_core();
        assert!(core.artworks.list(None).await.is_empty());

        let a = core.artworks.create("A", "", png_image("a.png")).await.unwrap();
        assert_eq!(a.order, 1);
        let b = core.artworks.create("B", "", png_image("b.png")).await.unwrap();
        assert_eq!(b.order, 2);

        core.artworks
            .reorder(&[b.id.clone(), a.id.clone()])
            .await
            .unwrap();
        let list = core.artworks.list(None).await;
        assert_eq!(list[0].id, b.id);
        assert_eq!(list[0].order, 0);
        assert_eq!(list[1].id, a.id);
        assert_eq!(list[1].order, 1);
    }

    #[tokio::test]
    async fn test_subscription_sees_creates_and_reorders() {
        let core = fresh_core();
        let mut feed = core.artworks.subscribe(None).await;
        assert!(feed.next().await.unwrap().is_empty());

        let a = core.artworks.create("A", "", png_image("a.png")).await.unwrap();
        let snapshot = feed.next().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, a.id);

        let b = core.artworks.create("B", "", png_image("b.png")).await.unwrap();
        let snapshot = feed.next().await.unwrap();
        assert_eq!(snapshot.len(), 2);

        core.artworks
            .reorder(&[b.id.clone(), a.id.clone()])
            .await
            .unwrap();
        let snapshot = feed.next().await.unwrap();
        assert_eq!(snapshot[0].id, b.id);
    }

    #[tokio::test]
    async fn test_excluding_feed_filters_one_artwork() {
        let core = fresh_core();
        let a = core.artworks.create("A", "", png_image("a.png")).await.unwrap();
        let _b = core.artworks.create("B", "", png_image("b.png")).await.unwrap();

        let mut feed = core.artworks.subscribe(Some(a.id.clone())).await;
        let snapshot = feed.next().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_ne!(snapshot[0].id, a.id);
    }
}
