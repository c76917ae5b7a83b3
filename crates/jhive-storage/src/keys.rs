//! Object key construction per media kind.

use uuid::Uuid;

/// What kind of media an object holds. Determines key prefix and the
/// content types accepted for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Avatar,
    Resume,
    CompanyLogo,
}

impl MediaKind {
    /// Key prefix for this kind.
    pub fn prefix(&self) -> &'static str {
        match self {
            MediaKind::Avatar => "avatars",
            MediaKind::Resume => "resumes",
            MediaKind::CompanyLogo => "companies",
        }
    }

    /// Content types accepted for this kind.
    pub fn allowed_content_types(&self) -> &'static [&'static str] {
        match self {
            MediaKind::Avatar | MediaKind::CompanyLogo => {
                &["image/jpeg", "image/png", "image/webp"]
            }
            MediaKind::Resume => &["application/pdf"],
        }
    }

    /// Whether a content type is acceptable for this kind.
    pub fn accepts(&self, content_type: &str) -> bool {
        self.allowed_content_types().contains(&content_type)
    }

    /// Build a fresh object key under the owning entity.
    pub fn object_key(&self, owner_id: &str, content_type: &str) -> String {
        format!(
            "{}/{}/{}.{}",
            self.prefix(),
            owner_id,
            Uuid::new_v4(),
            content_type_extension(content_type)
        )
    }
}

/// File extension for a supported content type.
pub fn content_type_extension(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "application/pdf" => "pdf",
        _ => "bin",
    }
}

/// An uploaded object: the public URL stored in documents plus the key
/// needed to delete it later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub url: String,
    pub key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_gating() {
        assert!(MediaKind::Avatar.accepts("image/png"));
        assert!(!MediaKind::Avatar.accepts("application/pdf"));
        assert!(MediaKind::Resume.accepts("application/pdf"));
        assert!(!MediaKind::Resume.accepts("image/png"));
        assert!(MediaKind::CompanyLogo.accepts("image/webp"));
    }

    #[test]
    fn object_keys_carry_prefix_owner_and_extension() {
        let key = MediaKind::Avatar.object_key("user-1", "image/png");
        assert!(key.starts_with("avatars/user-1/"));
        assert!(key.ends_with(".png"));

        let key = MediaKind::Resume.object_key("user-1", "application/pdf");
        assert!(key.starts_with("resumes/user-1/"));
        assert!(key.ends_with(".pdf"));
    }
}
