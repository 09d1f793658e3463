//! About singleton sync.
//!
//! One document at `about/content`. Reads materialize a built-in default
//! when the document is absent; every edit is a partial read-modify-write
//! sending only the touched keys. Skill mutations always replace the whole
//! `skills` array, matching entries by name - duplicate names are therefore
//! all affected by one mutation, which is the documented behavior.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::blob::{BlobStore, ImageFile};
use crate::models::{AboutContent, AboutPatch, Skill};
use crate::store::{DocumentStore, DocumentSubscription, StoreError};

use super::optimistic::EditState;
use super::SyncError;

pub const ABOUT_COLLECTION: &str = "about";
pub const ABOUT_DOC_ID: &str = "content";

/// Content shown (and persisted on first write) before the admin has saved
/// anything.
pub fn default_content() -> AboutContent {
    AboutContent {
        bio: "Emma is a freelance artist and designer based in [Location]. \
              She studied design and has been creating beautiful artwork for \
              clients around the world. Her work focuses on [art style/theme] \
              and she loves working with [mediums]. When she's not creating \
              art, you can find her [hobbies/interests]."
            .to_string(),
        email: "emmafleming@icloud.com".to_string(),
        instagram: "https://www.instagram.com/emmasartalbum/".to_string(),
        portrait_url: None,
        skills: vec![
            skill("Digital Illustration", 100),
            skill("Watercolor Painting", 95),
            skill("Portrait Drawing", 90),
            skill("Graphic Design", 85),
            skill("Photography", 80),
            skill("Print Design", 75),
        ],
        clients: vec![
            "Client One".to_string(),
            "Client Two".to_string(),
            "Client Three".to_string(),
            "Client Four".to_string(),
        ],
    }
}

fn skill(name: &str, percentage: u8) -> Skill {
    Skill {
        name: name.to_string(),
        percentage,
    }
}

pub struct AboutSync {
    store: Arc<DocumentStore>,
    blobs: Arc<BlobStore>,
    state: RwLock<EditState<AboutContent>>,
}

impl AboutSync {
    pub fn new(store: Arc<DocumentStore>, blobs: Arc<BlobStore>) -> Self {
        Self {
            store,
            blobs,
            state: RwLock::new(EditState::new(default_content())),
        }
    }

    /// Create the singleton with default content if it has never been
    /// written. Called once at startup so field saves have a target.
    pub async fn ensure_seeded(&self) {
        if self.store.get(ABOUT_COLLECTION, ABOUT_DOC_ID).await.is_none() {
            self.store
                .set(ABOUT_COLLECTION, ABOUT_DOC_ID, default_content().to_data())
                .await;
            tracing::info!("about document seeded with defaults");
        }
    }

    /// Current content: the optimistic value while a write is in flight,
    /// otherwise the stored document, or the built-in default when none
    /// exists.
    pub async fn current(&self) -> AboutContent {
        {
            let state = self.state.read().await;
            if state.is_pending() {
                return state.current().clone();
            }
        }
        match self.store.get(ABOUT_COLLECTION, ABOUT_DOC_ID).await {
            Some(doc) => AboutContent::from_document(doc).unwrap_or_else(default_content),
            None => default_content(),
        }
    }

    pub async fn subscribe(&self) -> AboutFeed {
        let inner = self
            .store
            .subscribe_document(ABOUT_COLLECTION, ABOUT_DOC_ID)
            .await;
        AboutFeed { inner }
    }

    /// Partial read-modify-write: only the keys present in `patch` are sent;
    /// the optimistic local value is rolled back if the store rejects the
    /// write (e.g. the singleton has never been created).
    pub async fn update_field(&self, patch: AboutPatch) -> Result<AboutContent, SyncError> {
        if patch.is_empty() {
            return Err(SyncError::Validation("no fields to update".to_string()));
        }

        let mut optimistic = self.current().await;
        patch.apply_to(&mut optimistic);
        self.state.write().await.begin(optimistic.clone());

        match self
            .store
            .update(ABOUT_COLLECTION, ABOUT_DOC_ID, patch.to_data())
            .await
        {
            Ok(()) => {
                self.state.write().await.confirm(optimistic.clone());
                Ok(optimistic)
            }
            Err(e) => {
                self.state.write().await.roll_back();
                tracing::warn!(error = %e, "about update failed, state rolled back");
                Err(e.into())
            }
        }
    }

    /// Replace the percentage of every skill whose name matches. No match is
    /// a no-op write of the unchanged array.
    pub async fn set_skill_percentage(
        &self,
        name: &str,
        percentage: u8,
    ) -> Result<AboutContent, SyncError> {
        validate_percentage(percentage)?;
        let skills = self
            .current()
            .await
            .skills
            .into_iter()
            .map(|mut s| {
                if s.name == name {
                    s.percentage = percentage;
                }
                s
            })
            .collect();
        self.write_skills(skills).await
    }

    /// Rename every skill whose name matches `old_name`.
    pub async fn rename_skill(
        &self,
        old_name: &str,
        new_name: &str,
    ) -> Result<AboutContent, SyncError> {
        if new_name.trim().is_empty() {
            return Err(SyncError::Validation("skill name is required".to_string()));
        }
        let skills = self
            .current()
            .await
            .skills
            .into_iter()
            .map(|mut s| {
                if s.name == old_name {
                    s.name = new_name.to_string();
                }
                s
            })
            .collect();
        self.write_skills(skills).await
    }

    pub async fn add_skill(&self, name: &str, percentage: u8) -> Result<AboutContent, SyncError> {
        if name.trim().is_empty() {
            return Err(SyncError::Validation("skill name is required".to_string()));
        }
        validate_percentage(percentage)?;
        let mut skills = self.current().await.skills;
        skills.push(Skill {
            name: name.to_string(),
            percentage,
        });
        self.write_skills(skills).await
    }

    /// Filter out every skill whose name matches. Idempotent: a second call
    /// with the same name is a no-op filter.
    pub async fn delete_skill(&self, name: &str) -> Result<AboutContent, SyncError> {
        let skills = self
            .current()
            .await
            .skills
            .into_iter()
            .filter(|s| s.name != name)
            .collect();
        self.write_skills(skills).await
    }

    async fn write_skills(&self, skills: Vec<Skill>) -> Result<AboutContent, SyncError> {
        self.update_field(AboutPatch {
            skills: Some(skills),
            ..Default::default()
        })
        .await
    }

    /// Upload the portrait, then patch `portraitUrl`. When the singleton has
    /// never been created, fall back to creating it with the full default
    /// content plus the new URL - a portrait can be the very first write
    /// that brings the document into existence.
    pub async fn upload_portrait(&self, image: ImageFile) -> Result<AboutContent, SyncError> {
        let url = self.blobs.store_portrait(&image).await?;
        let patch = AboutPatch {
            portrait_url: Some(url.clone()),
            ..Default::default()
        };
        match self.update_field(patch).await {
            Ok(content) => Ok(content),
            Err(SyncError::Store(StoreError::NotFound { .. })) => {
                let mut content = default_content();
                content.portrait_url = Some(url);
                self.store
                    .set(ABOUT_COLLECTION, ABOUT_DOC_ID, content.to_data())
                    .await;
                self.state.write().await.confirm(content.clone());
                tracing::info!("about document created by first portrait upload");
                Ok(content)
            }
            Err(e) => Err(e),
        }
    }
}

/// Feed of the singleton's value; absence materializes the default.
pub struct AboutFeed {
    inner: DocumentSubscription,
}

impl AboutFeed {
    pub async fn next(&mut self) -> Option<AboutContent> {
        let doc = self.inner.next().await?;
        Some(match doc {
            Some(doc) => AboutContent::from_document(doc).unwrap_or_else(default_content),
            None => default_content(),
        })
    }
}

fn validate_percentage(percentage: u8) -> Result<(), SyncError> {
    if percentage > 100 {
        return Err(SyncError::Validation(
            "percentage must be between 0 and 100".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::tests::png_image;
    use crate::sync::test_support::fresh_core;
    use serde_json::json;

    /// Persist the singleton so that field updates have a target.
    async fn seed_about(core: &crate::sync::SyncCore) -> AboutContent {
        let content = default_content();
        core.store
            .set(ABOUT_COLLECTION, ABOUT_DOC_ID, content.to_data())
            .await;
        content
    }

    #[tokio::test]
    async fn test_current_is_default_when_absent() {
        let core = fresh_core();
        let content = core.about.current().await;
        assert_eq!(content, default_content());
        assert!(content.portrait_url.is_none());
    }

    #[tokio::test]
    async fn test_subscribe_delivers_default_first_when_absent() {
        let core = fresh_core();
        let mut feed = core.about.subscribe().await;
        let first = feed.next().await.unwrap();
        assert_eq!(first, default_content());
        assert!(first.portrait_url.is_none());
    }

    #[tokio::test]
    async fn test_update_field_changes_only_bio() {
        let core = fresh_core();
        let before = seed_about(&core).await;

        let updated = core
            .about
            .update_field(AboutPatch {
                bio: Some("New bio".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(updated.bio, "New bio");
        assert_eq!(updated.email, before.email);
        assert_eq!(updated.instagram, before.instagram);
        assert_eq!(updated.skills, before.skills);
        assert_eq!(updated.clients, before.clients);

        // And the persisted document only had `bio` touched.
        let stored = core.about.current().await;
        assert_eq!(stored, updated);
    }

    #[tokio::test]
    async fn test_update_field_fails_when_document_absent() {
        let core = fresh_core();
        let err = core
            .about
            .update_field(AboutPatch {
                bio: Some("x".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Store(StoreError::NotFound { .. })));
        // Nothing was created by the failed write.
        assert!(core.store.get(ABOUT_COLLECTION, ABOUT_DOC_ID).await.is_none());
    }

    #[tokio::test]
    async fn test_empty_patch_is_rejected() {
        let core = fresh_core();
        seed_about(&core).await;
        assert!(matches!(
            core.about.update_field(AboutPatch::default()).await,
            Err(SyncError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_set_skill_percentage_by_name() {
        let core = fresh_core();
        seed_about(&core).await;
        let updated = core
            .about
            .set_skill_percentage("Photography", 42)
            .await
            .unwrap();
        let photo = updated.skills.iter().find(|s| s.name == "Photography").unwrap();
        assert_eq!(photo.percentage, 42);
        // Other entries untouched.
        let print = updated.skills.iter().find(|s| s.name == "Print Design").unwrap();
        assert_eq!(print.percentage, 75);
    }

    #[tokio::test]
    async fn test_percentage_out_of_range_is_rejected() {
        let core = fresh_core();
        seed_about(&core).await;
        assert!(matches!(
            core.about.set_skill_percentage("Photography", 101).await,
            Err(SyncError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_rename_skill_by_old_name() {
        let core = fresh_core();
        seed_about(&core).await;
        let updated = core
            .about
            .rename_skill("Photography", "Film Photography")
            .await
            .unwrap();
        assert!(updated.skills.iter().any(|s| s.name == "Film Photography"));
        assert!(!updated.skills.iter().any(|s| s.name == "Photography"));
    }

    #[tokio::test]
    async fn test_add_skill_appends() {
        let core = fresh_core();
        let before = seed_about(&core).await;
        let updated = core.about.add_skill("Ceramics", 60).await.unwrap();
        assert_eq!(updated.skills.len(), before.skills.len() + 1);
        assert_eq!(updated.skills.last().unwrap().name, "Ceramics");
    }

    #[tokio::test]
    async fn test_delete_skill_removes_one_and_is_idempotent() {
        let core = fresh_core();
        let before = seed_about(&core).await;

        let updated = core.about.delete_skill("Photography").await.unwrap();
        assert_eq!(updated.skills.len(), before.skills.len() - 1);
        assert!(!updated.skills.iter().any(|s| s.name == "Photography"));

        // Second call is a no-op filter.
        let again = core.about.delete_skill("Photography").await.unwrap();
        assert_eq!(again.skills, updated.skills);
    }

    #[tokio::test]
    async fn test_duplicate_names_are_all_affected() {
        let core = fresh_core();
        let mut content = default_content();
        content.skills = vec![skill("Inking", 50), skill("Inking", 70)];
        core.store
            .set(ABOUT_COLLECTION, ABOUT_DOC_ID, content.to_data())
            .await;

        // Mutation by name hits every match; documented edge case.
        let updated = core.about.set_skill_percentage("Inking", 90).await.unwrap();
        assert!(updated.skills.iter().all(|s| s.percentage == 90));

        let cleared = core.about.delete_skill("Inking").await.unwrap();
        assert!(cleared.skills.is_empty());
    }

    #[tokio::test]
    async fn test_portrait_upload_creates_singleton_with_defaults() {
        let core = fresh_core();
        // No document exists; the first subscribed value is the default.
        let mut feed = core.about.subscribe().await;
        assert_eq!(feed.next().await.unwrap(), default_content());

        let content = core.about.upload_portrait(png_image("me.png")).await.unwrap();
        let url = content.portrait_url.clone().unwrap();
        assert!(url.starts_with("/uploads/about/portrait-"));
        assert_eq!(content.bio, default_content().bio);
        assert_eq!(content.skills, default_content().skills);

        // The document now exists remotely with defaults plus the URL.
        let doc = core.store.get(ABOUT_COLLECTION, ABOUT_DOC_ID).await.unwrap();
        assert_eq!(doc.data["portraitUrl"], json!(url));
        assert_eq!(doc.data["email"], json!(default_content().email));

        // And the feed observed the creation.
        let next = feed.next().await.unwrap();
        assert_eq!(next.portrait_url, Some(url));
    }

    #[tokio::test]
    async fn test_portrait_upload_patches_existing_singleton() {
        let core = fresh_core();
        let mut before = seed_about(&core).await;
        before.bio = "custom bio".to_string();
        core.store
            .set(ABOUT_COLLECTION, ABOUT_DOC_ID, before.to_data())
            .await;

        let content = core.about.upload_portrait(png_image("me.jpg")).await.unwrap();
        assert!(content.portrait_url.is_some());
        // Existing fields were not reset to defaults.
        assert_eq!(content.bio, "custom bio");
    }
}
