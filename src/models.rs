//! Content models - wire/document representations of gallery and about content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::store::Document;

/// A single gallery artwork.
///
/// `order` defines display position; the collection sorted by `order`
/// ascending is the canonical gallery order. The write path keeps the values
/// dense in practice, but gaps after deletes are fine - only the sort order
/// matters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artwork {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub image_url: String,
    #[serde(default)]
    pub order: i64,
    pub created_at: DateTime<Utc>,
}

impl Artwork {
    /// Build an artwork from its store document. Returns `None` when the
    /// document is malformed (missing image or timestamp).
    pub fn from_document(doc: Document) -> Option<Self> {
        let mut data = doc.data;
        data.insert("id".to_string(), Value::String(doc.id));
        serde_json::from_value(Value::Object(data)).ok()
    }

    /// Document payload for this artwork, without the store-owned id.
    pub fn to_data(&self) -> Map<String, Value> {
        let mut data = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        data.remove("id");
        data
    }
}

/// One skill entry on the about page. `name` is the mutation key: renames,
/// percentage updates and deletes all match by current name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub name: String,
    /// 0-100.
    pub percentage: u8,
}

/// The about-page singleton document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AboutContent {
    pub bio: String,
    pub email: String,
    pub instagram: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portrait_url: Option<String>,
    pub skills: Vec<Skill>,
    pub clients: Vec<String>,
}

impl AboutContent {
    pub fn from_document(doc: Document) -> Option<Self> {
        serde_json::from_value(Value::Object(doc.data)).ok()
    }

    pub fn to_data(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Partial update for the about singleton. Only the fields that are `Some`
/// are written; everything else is left untouched remotely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AboutPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portrait_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills: Option<Vec<Skill>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clients: Option<Vec<String>>,
}

impl AboutPatch {
    pub fn is_empty(&self) -> bool {
        self.bio.is_none()
            && self.email.is_none()
            && self.instagram.is_none()
            && self.portrait_url.is_none()
            && self.skills.is_none()
            && self.clients.is_none()
    }

    /// The keys actually present in this patch, as a document merge payload.
    pub fn to_data(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Apply the present fields to a local copy of the content.
    pub fn apply_to(&self, content: &mut AboutContent) {
        if let Some(bio) = &self.bio {
            content.bio = bio.clone();
        }
        if let Some(email) = &self.email {
            content.email = email.clone();
        }
        if let Some(instagram) = &self.instagram {
            content.instagram = instagram.clone();
        }
        if let Some(url) = &self.portrait_url {
            content.portrait_url = Some(url.clone());
        }
        if let Some(skills) = &self.skills {
            content.skills = skills.clone();
        }
        if let Some(clients) = &self.clients {
            content.clients = clients.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_artwork() -> Artwork {
        Artwork {
            id: "a1".to_string(),
            title: "Dunes".to_string(),
            description: String::new(),
            image_url: "/uploads/artworks/1-dunes.png".to_string(),
            order: 3,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_artwork_document_round_trip() {
        let artwork = sample_artwork();
        let doc = Document {
            id: artwork.id.clone(),
            data: artwork.to_data(),
        };
        let back = Artwork::from_document(doc).unwrap();
        assert_eq!(back, artwork);
    }

    #[test]
    fn test_artwork_data_excludes_id() {
        let data = sample_artwork().to_data();
        assert!(!data.contains_key("id"));
        assert!(data.contains_key("imageUrl"));
        assert!(data.contains_key("createdAt"));
    }

    #[test]
    fn test_artwork_wire_names_are_camel_case() {
        let json = serde_json::to_string(&sample_artwork()).unwrap();
        assert!(json.contains("\"imageUrl\""));
        assert!(json.contains("\"createdAt\""));
        assert!(!json.contains("image_url"));
    }

    #[test]
    fn test_about_patch_serializes_only_present_keys() {
        let patch = AboutPatch {
            bio: Some("new bio".to_string()),
            ..Default::default()
        };
        let data = patch.to_data();
        assert_eq!(data.len(), 1);
        assert_eq!(data["bio"], "new bio");
    }

    #[test]
    fn test_about_patch_apply_changes_only_present_fields() {
        let mut content = AboutContent {
            bio: "old".to_string(),
            email: "a@b.c".to_string(),
            instagram: "ig".to_string(),
            portrait_url: None,
            skills: vec![],
            clients: vec!["One".to_string()],
        };
        let patch = AboutPatch {
            bio: Some("new".to_string()),
            ..Default::default()
        };
        patch.apply_to(&mut content);
        assert_eq!(content.bio, "new");
        assert_eq!(content.email, "a@b.c");
        assert_eq!(content.clients, vec!["One".to_string()]);
    }

    #[test]
    fn test_absent_portrait_is_omitted_from_document() {
        let content = AboutContent {
            bio: String::new(),
            email: String::new(),
            instagram: String::new(),
            portrait_url: None,
            skills: vec![],
            clients: vec![],
        };
        assert!(!content.to_data().contains_key("portraitUrl"));
    }

    #[test]
    fn test_empty_patch_is_empty() {
        assert!(AboutPatch::default().is_empty());
        assert!(AboutPatch::default().to_data().is_empty());
    }
}
