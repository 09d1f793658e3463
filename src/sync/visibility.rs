//! Section visibility toggles for the about page.
//!
//! Admin-only switches that hide whole sections from visitors. Held in
//! process memory: the set of sections is fixed and the switches reset to
//! visible on restart.

use std::collections::HashMap;

use tokio::sync::RwLock;

use super::SyncError;

/// The toggleable sections, in page order.
pub const SECTIONS: [&str; 5] = ["about", "contact", "skills", "clients", "contactForm"];

pub struct SectionVisibility {
    sections: RwLock<HashMap<String, bool>>,
}

impl SectionVisibility {
    pub fn new() -> Self {
        let sections = SECTIONS
            .iter()
            .map(|name| (name.to_string(), true))
            .collect();
        Self {
            sections: RwLock::new(sections),
        }
    }

    /// Flip one section; returns its new value.
    pub async fn toggle(&self, section: &str) -> Result<bool, SyncError> {
        let mut sections = self.sections.write().await;
        match sections.get_mut(section) {
            Some(visible) => {
                *visible = !*visible;
                Ok(*visible)
            }
            None => Err(SyncError::Validation(format!(
                "unknown section: {section}"
            ))),
        }
    }

    pub async fn snapshot(&self) -> HashMap<String, bool> {
        self.sections.read().await.clone()
    }
}

impl Default for SectionVisibility {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_all_sections_start_visible() {
        let visibility = SectionVisibility::new();
        let snapshot = visibility.snapshot().await;
        assert_eq!(snapshot.len(), SECTIONS.len());
        assert!(snapshot.values().all(|v| *v));
    }

    #[tokio::test]
    async fn test_toggle_flips_and_reports() {
        let visibility = SectionVisibility::new();
        assert!(!visibility.toggle("skills").await.unwrap());
        assert!(visibility.toggle("skills").await.unwrap());
        // Other sections untouched.
        assert!(visibility.snapshot().await["clients"]);
    }

    #[tokio::test]
    async fn test_unknown_section_is_rejected() {
        let visibility = SectionVisibility::new();
        assert!(matches!(
            visibility.toggle("footer").await,
            Err(SyncError::Validation(_))
        ));
    }
}
