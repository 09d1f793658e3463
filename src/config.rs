//! Environment-backed configuration.
//!
//! Follows the same convention everywhere: a config struct whose `Default`
//! reads the process environment with sensible dev fallbacks. `dotenvy`
//! loads `.env` once at startup.

use std::path::PathBuf;

/// Where uploaded images live and how their URLs are built.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub root: PathBuf,
    /// Prepended to `/uploads/...` URLs; empty means same-origin relative.
    pub public_base: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            root: std::env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("uploads")),
            public_base: std::env::var("PUBLIC_BASE_URL").unwrap_or_default(),
        }
    }
}

/// Transactional-mail settings for the contact relay (Resend).
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_key: String,
    pub from_email: String,
    pub to_email: String,
    /// Signs the confirmation email.
    pub artist_name: String,
}

impl MailConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("RESEND_API_KEY").unwrap_or_default(),
            from_email: std::env::var("RESEND_FROM_EMAIL").unwrap_or_default(),
            to_email: std::env::var("RESEND_TO_EMAIL").unwrap_or_default(),
            artist_name: std::env::var("SITE_ARTIST_NAME")
                .unwrap_or_else(|_| "Emma Fleming".to_string()),
        }
    }

    /// All three provider values must be present before any send is
    /// attempted; a missing one is a configuration error, not a validation
    /// error.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.from_email.is_empty() && !self.to_email.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_config_has_a_root() {
        let config = UploadConfig::default();
        assert!(!config.root.as_os_str().is_empty());
    }

    #[test]
    fn test_mail_config_unconfigured_when_fields_missing() {
        let config = MailConfig {
            api_key: String::new(),
            from_email: "a@b.c".to_string(),
            to_email: "d@e.f".to_string(),
            artist_name: "X".to_string(),
        };
        assert!(!config.is_configured());
    }

    #[test]
    fn test_mail_config_configured_when_all_present() {
        let config = MailConfig {
            api_key: "re_123".to_string(),
            from_email: "a@b.c".to_string(),
            to_email: "d@e.f".to_string(),
            artist_name: "X".to_string(),
        };
        assert!(config.is_configured());
    }
}
