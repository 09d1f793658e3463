//! Blob store for uploaded images.
//!
//! Disk-backed: files land under the upload root and are served back at
//! stable `/uploads/...` URLs. Artwork images go under `artworks/` keyed by
//! upload timestamp and original filename; portraits under `about/` keyed by
//! timestamp and extension.

use std::path::PathBuf;

use chrono::Utc;

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

/// 10 MB, matching the portrait-upload cap of the site.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("empty file")]
    Empty,
    #[error("file too large, maximum size is 10MB")]
    TooLarge,
    #[error("unsupported file type, allowed: JPEG, PNG, WebP, GIF")]
    UnsupportedType,
    #[error("failed to save file")]
    Io(#[from] std::io::Error),
}

/// An image handed in by a client: original filename plus raw bytes.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

pub struct BlobStore {
    root: PathBuf,
    public_base: String,
}

impl BlobStore {
    /// `public_base` is prepended to returned URLs; empty means same-origin
    /// relative URLs.
    pub fn new(root: PathBuf, public_base: String) -> Self {
        let public_base = public_base.trim_end_matches('/').to_string();
        Self { root, public_base }
    }

    /// Store an artwork image under `artworks/{timestamp}-{filename}` and
    /// return its public URL.
    pub async fn store_artwork_image(&self, image: &ImageFile) -> Result<String, BlobError> {
        validate_image(image)?;
        let key = format!(
            "artworks/{}-{}",
            Utc::now().timestamp_millis(),
            sanitize_filename(&image.file_name)
        );
        self.write(&key, &image.bytes).await
    }

    /// Store a portrait under `about/portrait-{timestamp}.{ext}` and return
    /// its public URL.
    pub async fn store_portrait(&self, image: &ImageFile) -> Result<String, BlobError> {
        validate_image(image)?;
        let ext = image
            .file_name
            .rsplit('.')
            .next()
            .filter(|e| ALLOWED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or("jpg")
            .to_lowercase();
        let key = format!("about/portrait-{}.{}", Utc::now().timestamp_millis(), ext);
        self.write(&key, &image.bytes).await
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<String, BlobError> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        tracing::info!(key = %key, size = bytes.len(), "image stored");
        Ok(format!("{}/uploads/{}", self.public_base, key))
    }
}

fn validate_image(image: &ImageFile) -> Result<(), BlobError> {
    if image.bytes.is_empty() {
        return Err(BlobError::Empty);
    }
    if image.bytes.len() > MAX_IMAGE_BYTES {
        return Err(BlobError::TooLarge);
    }
    if image_mime(&image.bytes).is_none() {
        return Err(BlobError::UnsupportedType);
    }
    Ok(())
}

/// Sniff the content type from magic bytes; extension alone is not trusted.
fn image_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() < 4 {
        return None;
    }
    match bytes {
        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        // PNG: 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        // GIF: 47 49 46 38
        [0x47, 0x49, 0x46, 0x38, ..] => Some("image/gif"),
        // WebP: 52 49 46 46 ... 57 45 42 50
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some("image/webp"),
        _ => None,
    }
}

fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn png_image(name: &str) -> ImageFile {
        ImageFile {
            file_name: name.to_string(),
            bytes: vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A],
        }
    }

    pub fn test_store() -> BlobStore {
        let root = std::env::temp_dir().join(format!("gallery-blob-{}", uuid::Uuid::new_v4()));
        BlobStore::new(root, String::new())
    }

    #[test]
    fn test_magic_bytes_detection() {
        assert_eq!(image_mime(&[0xFF, 0xD8, 0xFF, 0x00]), Some("image/jpeg"));
        assert_eq!(image_mime(&[0x89, 0x50, 0x4E, 0x47]), Some("image/png"));
        assert_eq!(image_mime(b"GIF89a"), Some("image/gif"));
        assert_eq!(image_mime(b"plain text here"), None);
        assert_eq!(image_mime(&[0xFF]), None);
    }

    #[test]
    fn test_sanitize_filename_strips_path_characters() {
        // Dots are kept; slashes become '-', so embedded ".." cannot traverse
        // once the key is prefixed with the timestamp.
        assert_eq!(sanitize_filename("../../etc/passwd"), "..-..-etc-passwd");
        assert_eq!(sanitize_filename("sunset at sea.png"), "sunset-at-sea.png");
        assert_eq!(sanitize_filename(""), "image");
    }

    #[test]
    fn test_validate_rejects_empty_and_oversized() {
        let empty = ImageFile {
            file_name: "a.png".to_string(),
            bytes: vec![],
        };
        assert!(matches!(validate_image(&empty), Err(BlobError::Empty)));

        let mut big = png_image("a.png");
        big.bytes.resize(MAX_IMAGE_BYTES + 1, 0);
        assert!(matches!(validate_image(&big), Err(BlobError::TooLarge)));
    }

    #[tokio::test]
    async fn test_store_artwork_image_returns_prefixed_url() {
        let store = test_store();
        let url = store.store_artwork_image(&png_image("dunes.png")).await.unwrap();
        assert!(url.starts_with("/uploads/artworks/"));
        assert!(url.ends_with("-dunes.png"));
    }

    #[tokio::test]
    async fn test_store_portrait_uses_extension_key() {
        let store = test_store();
        let url = store.store_portrait(&png_image("me.PNG")).await.unwrap();
        assert!(url.starts_with("/uploads/about/portrait-"));
        assert!(url.ends_with(".png"));
    }

    #[tokio::test]
    async fn test_rejected_upload_writes_nothing() {
        let store = test_store();
        let bad = ImageFile {
            file_name: "notes.txt".to_string(),
            bytes: b"not an image".to_vec(),
        };
        assert!(store.store_artwork_image(&bad).await.is_err());
        assert!(!store.root.exists());
    }
}
