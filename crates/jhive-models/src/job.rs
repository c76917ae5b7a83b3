//! Job posting models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::company::CompanyId;
use crate::user::UserId;

/// Unique identifier for a job posting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
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

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Job lifecycle status. Listings default to `open` unless a status is
/// requested explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Open,
    Closed,
    Paused,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Open => "open",
            JobStatus::Closed => "closed",
            JobStatus::Paused => "paused",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "closed" => Some(Self::Closed),
            "paused" => Some(Self::Paused),
            _ => None,
        }
    }

    /// Allowed values, for error messages.
    pub const ALL: [JobStatus; 3] = [JobStatus::Open, JobStatus::Closed, JobStatus::Paused];
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Employment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum JobType {
    #[default]
    #[serde(rename = "full-time")]
    FullTime,
    #[serde(rename = "part-time")]
    PartTime,
    #[serde(rename = "contract")]
    Contract,
    #[serde(rename = "internship")]
    Internship,
    #[serde(rename = "freelance")]
    Freelance,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::FullTime => "full-time",
            JobType::PartTime => "part-time",
            JobType::Contract => "contract",
            JobType::Internship => "internship",
            JobType::Freelance => "freelance",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "full-time" => Some(Self::FullTime),
            "part-time" => Some(Self::PartTime),
            "contract" => Some(Self::Contract),
            "internship" => Some(Self::Internship),
            "freelance" => Some(Self::Freelance),
            _ => None,
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Seniority band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    Intern,
    #[default]
    Junior,
    Mid,
    Senior,
    Lead,
}

impl ExperienceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperienceLevel::Intern => "intern",
            ExperienceLevel::Junior => "junior",
            ExperienceLevel::Mid => "mid",
            ExperienceLevel::Senior => "senior",
            ExperienceLevel::Lead => "lead",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "intern" => Some(Self::Intern),
            "junior" => Some(Self::Junior),
            "mid" => Some(Self::Mid),
            "senior" => Some(Self::Senior),
            "lead" => Some(Self::Lead),
            _ => None,
        }
    }
}

impl fmt::Display for ExperienceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Salary band. `min <= max` is validated at the handler layer when both
/// bounds are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Salary {
    pub min: Option<i64>,
    pub max: Option<i64>,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "INR".to_string()
}

impl Default for Salary {
    fn default() -> Self {
        Self {
            min: None,
            max: None,
            currency: default_currency(),
        }
    }
}

/// Job location, including the remote flag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobLocation {
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    #[serde(default)]
    pub remote: bool,
}

/// Job posting stored in Firestore.
///
/// `application_count` is advisory (best-effort increments/decrements on
/// application create/delete).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub title: String,
    pub slug: String,
    pub description: String,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub responsibilities: Vec<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub salary: Salary,
    #[serde(default)]
    pub job_type: JobType,
    #[serde(default)]
    pub experience_level: ExperienceLevel,
    #[serde(default)]
    pub location: JobLocation,
    #[serde(default)]
    pub status: JobStatus,
    pub company: CompanyId,
    pub created_by: UserId,
    #[serde(default)]
    pub application_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new open job posting.
    pub fn new(
        title: impl Into<String>,
        slug: impl Into<String>,
        description: impl Into<String>,
        company: CompanyId,
        created_by: UserId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            title: title.into(),
            slug: slug.into(),
            description: description.into(),
            requirements: Vec::new(),
            responsibilities: Vec::new(),
            skills: Vec::new(),
            salary: Salary::default(),
            job_type: JobType::default(),
            experience_level: ExperienceLevel::default(),
            location: JobLocation::default(),
            status: JobStatus::Open,
            company,
            created_by,
            application_count: 0,
            expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Lowercased title, maintained as a shadow field for search.
    pub fn title_lc(&self) -> String {
        self.title.to_lowercase()
    }

    /// Whether the posting has lapsed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|exp| exp < now).unwrap_or(false)
    }

    /// Whether the job can currently receive applications.
    pub fn accepts_applications(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Open && !self.is_expired(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn open_and_unexpired_accepts_applications() {
        let job = Job::new("Backend Engineer", "backend-engineer", "desc", CompanyId::new(), UserId::new());
        assert!(job.accepts_applications(Utc::now()));
    }

    #[test]
    fn closed_paused_or_expired_rejects_applications() {
        let now = Utc::now();
        let mut job = Job::new("Backend Engineer", "backend-engineer", "desc", CompanyId::new(), UserId::new());

        job.status = JobStatus::Closed;
        assert!(!job.accepts_applications(now));

        job.status = JobStatus::Paused;
        assert!(!job.accepts_applications(now));

        job.status = JobStatus::Open;
        job.expires_at = Some(now - Duration::hours(1));
        assert!(!job.accepts_applications(now));
    }

    #[test]
    fn enum_round_trips() {
        for status in JobStatus::ALL {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(JobType::parse("part-time"), Some(JobType::PartTime));
        assert_eq!(JobType::parse("fulltime"), None);
        assert_eq!(ExperienceLevel::parse("senior"), Some(ExperienceLevel::Senior));
    }
}
