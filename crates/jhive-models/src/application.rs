//! Job application models and the status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::company::CompanyId;
use crate::job::{ExperienceLevel, JobId, JobLocation, JobType};
use crate::user::UserId;

/// Application identifier.
///
/// Deterministic: `{job_id}--{applicant_id}`. One application per job per
/// applicant is therefore enforced by the document store itself; creating a
/// duplicate fails with ALREADY_EXISTS.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub String);

impl ApplicationId {
    /// Build the deterministic ID for a (job, applicant) pair.
    pub fn for_pair(job: &JobId, applicant: &UserId) -> Self {
        Self(format!("{}--{}", job.as_str(), applicant.as_str()))
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

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ApplicationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Application workflow status.
///
/// `Rejected` and `Hired` are terminal: once an application is finalized it
/// cannot be moved again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    #[default]
    Applied,
    Shortlisted,
    Interview,
    Rejected,
    Hired,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "applied",
            ApplicationStatus::Shortlisted => "shortlisted",
            ApplicationStatus::Interview => "interview",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Hired => "hired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "applied" => Some(Self::Applied),
            "shortlisted" => Some(Self::Shortlisted),
            "interview" => Some(Self::Interview),
            "rejected" => Some(Self::Rejected),
            "hired" => Some(Self::Hired),
            _ => None,
        }
    }

    /// Terminal statuses cannot be transitioned out of.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ApplicationStatus::Rejected | ApplicationStatus::Hired)
    }

    /// Allowed values, for error messages.
    pub const ALL: [ApplicationStatus; 5] = [
        ApplicationStatus::Applied,
        ApplicationStatus::Shortlisted,
        ApplicationStatus::Interview,
        ApplicationStatus::Rejected,
        ApplicationStatus::Hired,
    ];
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Salary band snapshotted from the job at apply time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalarySnapshot {
    pub min: Option<i64>,
    pub max: Option<i64>,
    #[serde(default)]
    pub currency: String,
}

/// A requested status change, as supplied by an employer or admin.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub status: ApplicationStatus,
    /// Free-text reason; only meaningful when moving to `rejected`.
    pub rejected_reason: Option<String>,
    /// Scheduled interview; only meaningful when moving to `interview`.
    pub interview_date: Option<DateTime<Utc>>,
}

/// Why a status change was refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("application is already {from} and cannot be moved")]
    Finalized { from: ApplicationStatus },
}

/// Job application stored in Firestore.
///
/// The `*_snapshot` fields are captured once at creation and never resynced,
/// so the record stays historically accurate across later job edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: ApplicationId,
    pub job: JobId,
    pub company: CompanyId,
    pub applicant: UserId,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_letter: Option<String>,

    #[serde(default)]
    pub status: ApplicationStatus,
    #[serde(default)]
    pub viewed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interview_date: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_title_snapshot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name_snapshot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_location_snapshot: Option<JobLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_type_snapshot: Option<JobType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience_level_snapshot: Option<ExperienceLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_salary_snapshot: Option<SalarySnapshot>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    /// Create a fresh application in `applied` state.
    pub fn new(job: JobId, company: CompanyId, applicant: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: ApplicationId::for_pair(&job, &applicant),
            job,
            company,
            applicant,
            resume_url: None,
            resume_key: None,
            cover_letter: None,
            status: ApplicationStatus::Applied,
            viewed: false,
            rejected_reason: None,
            interview_date: None,
            job_title_snapshot: None,
            company_name_snapshot: None,
            job_location_snapshot: None,
            job_type_snapshot: None,
            experience_level_snapshot: None,
            job_salary_snapshot: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a status change, enforcing the state machine:
    ///
    /// - any direct transition is allowed except out of a terminal status;
    /// - `rejected` keeps the supplied reason and clears the interview date;
    /// - `interview` keeps the supplied date and clears the rejection reason;
    /// - every other target clears both;
    /// - every transition marks the application as viewed.
    pub fn apply_transition(&mut self, change: StatusChange) -> Result<(), TransitionError> {
        if self.status.is_terminal() && change.status != self.status {
            return Err(TransitionError::Finalized { from: self.status });
        }

        self.status = change.status;
        self.viewed = true;

        match change.status {
            ApplicationStatus::Rejected => {
                self.rejected_reason = change
                    .rejected_reason
                    .map(|r| r.trim().to_string())
                    .filter(|r| !r.is_empty());
                self.interview_date = None;
            }
            ApplicationStatus::Interview => {
                self.rejected_reason = None;
                self.interview_date = change.interview_date;
            }
            _ => {
                self.rejected_reason = None;
                self.interview_date = None;
            }
        }

        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn fresh() -> Application {
        Application::new(JobId::new(), CompanyId::new(), UserId::new())
    }

    fn change(status: ApplicationStatus) -> StatusChange {
        StatusChange {
            status,
            rejected_reason: None,
            interview_date: None,
        }
    }

    #[test]
    fn deterministic_id_for_pair() {
        let job = JobId::from_string("job-1");
        let applicant = UserId::from_string("user-1");
        assert_eq!(
            ApplicationId::for_pair(&job, &applicant).as_str(),
            "job-1--user-1"
        );
    }

    #[test]
    fn rejection_sets_reason_and_clears_interview_date() {
        let mut app = fresh();
        app.interview_date = Some(Utc::now() + Duration::days(3));

        app.apply_transition(StatusChange {
            status: ApplicationStatus::Rejected,
            rejected_reason: Some("  position filled  ".to_string()),
            interview_date: None,
        })
        .unwrap();

        assert_eq!(app.status, ApplicationStatus::Rejected);
        assert_eq!(app.rejected_reason.as_deref(), Some("position filled"));
        assert!(app.interview_date.is_none());
        assert!(app.viewed);
    }

    #[test]
    fn interview_sets_date_and_clears_rejection_reason() {
        let mut app = fresh();
        app.rejected_reason = Some("old reason".to_string());
        let when = Utc::now() + Duration::days(7);

        app.apply_transition(StatusChange {
            status: ApplicationStatus::Interview,
            rejected_reason: None,
            interview_date: Some(when),
        })
        .unwrap();

        assert_eq!(app.status, ApplicationStatus::Interview);
        assert!(app.rejected_reason.is_none());
        assert_eq!(app.interview_date, Some(when));
    }

    #[test]
    fn other_statuses_clear_both_exclusive_fields() {
        let mut app = fresh();
        app.apply_transition(StatusChange {
            status: ApplicationStatus::Interview,
            rejected_reason: None,
            interview_date: Some(Utc::now()),
        })
        .unwrap();

        app.apply_transition(change(ApplicationStatus::Shortlisted)).unwrap();
        assert!(app.interview_date.is_none());
        assert!(app.rejected_reason.is_none());
    }

    #[test]
    fn every_transition_marks_viewed() {
        let mut app = fresh();
        assert!(!app.viewed);
        app.apply_transition(change(ApplicationStatus::Shortlisted)).unwrap();
        assert!(app.viewed);
    }

    #[test]
    fn terminal_statuses_are_locked() {
        let mut app = fresh();
        app.apply_transition(change(ApplicationStatus::Hired)).unwrap();

        let err = app
            .apply_transition(change(ApplicationStatus::Shortlisted))
            .unwrap_err();
        assert_eq!(
            err,
            TransitionError::Finalized {
                from: ApplicationStatus::Hired
            }
        );

        let mut app = fresh();
        app.apply_transition(change(ApplicationStatus::Rejected)).unwrap();
        assert!(app
            .apply_transition(change(ApplicationStatus::Interview))
            .is_err());
    }

    #[test]
    fn empty_rejection_reason_stored_as_none() {
        let mut app = fresh();
        app.apply_transition(StatusChange {
            status: ApplicationStatus::Rejected,
            rejected_reason: Some("   ".to_string()),
            interview_date: None,
        })
        .unwrap();
        assert!(app.rejected_reason.is_none());
    }
}
