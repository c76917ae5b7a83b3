//! Company profile models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::user::UserId;

/// Unique identifier for a company.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompanyId(pub String);

impl CompanyId {
    /// Generate a new random company ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CompanyId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CompanyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CompanyId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CompanyId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// City/state/country triple on a company profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyLocation {
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

/// Company profile stored in Firestore.
///
/// `jobs_count` is advisory: it is adjusted best-effort when jobs are
/// created or deleted and may lag the true count.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_key: Option<String>,
    #[serde(default)]
    pub location: CompanyLocation,
    /// Owner (the creating employer, until an admin reassigns it).
    pub owner: UserId,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub jobs_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Company {
    /// Create a new, unverified company owned by its creator.
    pub fn new(name: impl Into<String>, slug: impl Into<String>, owner: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: CompanyId::new(),
            name: name.into(),
            slug: slug.into(),
            description: None,
            website: None,
            industry: None,
            logo_url: None,
            logo_key: None,
            location: CompanyLocation::default(),
            owner,
            verified: false,
            jobs_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Lowercased name, maintained as a shadow field for search.
    pub fn name_lc(&self) -> String {
        self.name.to_lowercase()
    }
}
