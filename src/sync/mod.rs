//! Content sync core.
//!
//! Maintains the client-visible state of the two site entities - the ordered
//! artwork collection and the about singleton - by subscribing to the
//! document store and issuing writes (including the batched reorder) back to
//! it. Handlers reach the shared core through the same global-handle pattern
//! the rest of the crate uses for process-wide resources.

pub mod about;
pub mod artworks;
pub mod optimistic;
pub mod visibility;

use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::blob::{BlobError, BlobStore};
use crate::config::UploadConfig;
use crate::store::{DocumentStore, StoreError};

pub use about::AboutSync;
pub use artworks::ArtworkSync;
pub use visibility::SectionVisibility;

static CORE: OnceCell<Arc<SyncCore>> = OnceCell::const_new();

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Rejected before any state change.
    #[error("{0}")]
    Validation(String),
    /// The addressed entity does not exist; an absent-state view, not a
    /// transient failure.
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Blob(#[from] BlobError),
}

pub struct SyncCore {
    pub store: Arc<DocumentStore>,
    pub blobs: Arc<BlobStore>,
    pub artworks: ArtworkSync,
    pub about: AboutSync,
    pub visibility: SectionVisibility,
}

impl SyncCore {
    pub fn new(store: Arc<DocumentStore>, blobs: Arc<BlobStore>) -> Arc<Self> {
        Arc::new(Self {
            artworks: ArtworkSync::new(store.clone(), blobs.clone()),
            about: AboutSync::new(store.clone(), blobs.clone()),
            visibility: SectionVisibility::new(),
            store,
            blobs,
        })
    }
}

/// Initialize the process-wide core. The first call wins; later calls return
/// the already-initialized core (mirrors the one-shot pool init).
pub fn init(upload: &UploadConfig) -> Arc<SyncCore> {
    let store = DocumentStore::new();
    let blobs = Arc::new(BlobStore::new(upload.root.clone(), upload.public_base.clone()));
    let core = SyncCore::new(store, blobs);
    let _ = CORE.set(core.clone());
    CORE.get().cloned().unwrap_or(core)
}

pub fn get_core() -> Option<Arc<SyncCore>> {
    CORE.get().cloned()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Fresh, isolated core for direct sync tests.
    pub fn fresh_core() -> Arc<SyncCore> {
        let store = DocumentStore::new();
        let root = std::env::temp_dir().join(format!("gallery-sync-{}", uuid::Uuid::new_v4()));
        let blobs = Arc::new(BlobStore::new(root, String::new()));
        SyncCore::new(store, blobs)
    }

    /// Ensure the process-wide core exists for router tests. Shared across
    /// tests in the binary, so router tests must not assume an empty store.
    pub fn init_global() -> Arc<SyncCore> {
        let upload = UploadConfig {
            root: std::env::temp_dir().join("gallery-route-tests"),
            public_base: String::new(),
        };
        init(&upload)
    }
}
