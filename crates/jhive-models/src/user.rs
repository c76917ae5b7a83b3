//! User account models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::company::CompanyId;

/// Unique identifier for a user account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Generate a new random user ID.
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

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Account role. `Admin` is never accepted from client input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Jobseeker,
    Employer,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Jobseeker => "jobseeker",
            UserRole::Employer => "employer",
            UserRole::Admin => "admin",
        }
    }

    /// Parse a stored role string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "jobseeker" => Some(Self::Jobseeker),
            "employer" => Some(Self::Employer),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Resolve a role requested at registration. `admin` (or anything
    /// unknown) falls back to jobseeker.
    pub fn from_registration(requested: Option<&str>) -> Self {
        match requested {
            Some("employer") => Self::Employer,
            _ => Self::Jobseeker,
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// City/state/country triple on a user profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLocation {
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

/// User account stored in Firestore.
///
/// OTP hashes are SHA-256 hex digests of the 6-digit codes; the raw codes
/// are only ever sent by email. `refresh_token_hash` holds the digest of the
/// currently valid refresh token and is rotated on every refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    /// Normalized (lowercased, trimmed) email address. Unique.
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_key: Option<String>,

    /// Company this user owns (employers only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<CompanyId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default)]
    pub location: UserLocation,
    #[serde(default)]
    pub skills: Vec<String>,

    #[serde(default)]
    pub email_verified: bool,

    #[serde(skip_serializing)]
    pub email_verification_otp_hash: Option<String>,
    #[serde(skip_serializing)]
    pub email_verification_otp_expires: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub last_verification_sent_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing)]
    pub password_reset_otp_hash: Option<String>,
    #[serde(skip_serializing)]
    pub password_reset_otp_expires: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub last_password_reset_sent_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing)]
    pub refresh_token_hash: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new, unverified account.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
        role: UserRole,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            name: name.into(),
            email: normalize_email(&email.into()),
            password_hash: password_hash.into(),
            role,
            avatar_url: None,
            avatar_key: None,
            resume_url: None,
            resume_key: None,
            company: None,
            bio: None,
            location: UserLocation::default(),
            skills: Vec::new(),
            email_verified: false,
            email_verification_otp_hash: None,
            email_verification_otp_expires: None,
            last_verification_sent_at: None,
            password_reset_otp_hash: None,
            password_reset_otp_expires: None,
            last_password_reset_sent_at: None,
            refresh_token_hash: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the unverified account's OTP window has lapsed, making the
    /// account eligible for replacement on re-registration.
    pub fn verification_expired(&self, now: DateTime<Utc>) -> bool {
        !self.email_verified
            && self
                .email_verification_otp_expires
                .map(|exp| exp < now)
                .unwrap_or(false)
    }

    /// Clear verification OTP state after a successful match.
    pub fn clear_verification_otp(&mut self) {
        self.email_verification_otp_hash = None;
        self.email_verification_otp_expires = None;
        self.last_verification_sent_at = None;
    }

    /// Clear password-reset OTP state after a successful reset.
    pub fn clear_reset_otp(&mut self) {
        self.password_reset_otp_hash = None;
        self.password_reset_otp_expires = None;
        self.last_password_reset_sent_at = None;
    }
}

/// Normalize an email for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn registration_role_never_grants_admin() {
        assert_eq!(UserRole::from_registration(Some("admin")), UserRole::Jobseeker);
        assert_eq!(UserRole::from_registration(Some("employer")), UserRole::Employer);
        assert_eq!(UserRole::from_registration(Some("jobseeker")), UserRole::Jobseeker);
        assert_eq!(UserRole::from_registration(None), UserRole::Jobseeker);
        assert_eq!(UserRole::from_registration(Some("superuser")), UserRole::Jobseeker);
    }

    #[test]
    fn email_normalization() {
        assert_eq!(normalize_email("  Jane.Doe@Example.COM "), "jane.doe@example.com");
    }

    #[test]
    fn verification_expiry_window() {
        let mut user = User::new("Jane", "jane@example.com", "hash", UserRole::Jobseeker);
        let now = Utc::now();

        // No OTP issued yet: not eligible for replacement
        assert!(!user.verification_expired(now));

        user.email_verification_otp_expires = Some(now - Duration::minutes(1));
        assert!(user.verification_expired(now));

        user.email_verification_otp_expires = Some(now + Duration::minutes(10));
        assert!(!user.verification_expired(now));

        // Verified accounts never expire
        user.email_verified = true;
        user.email_verification_otp_expires = Some(now - Duration::minutes(1));
        assert!(!user.verification_expired(now));
    }
}
