//! Job application handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use jhive_firestore::applications_repo::{JobApplicationsQuery, MyApplicationsQuery};
use jhive_models::{
    Application, ApplicationId, ApplicationStatus, ExperienceLevel, JobId, JobLocation, JobType,
    PageMeta, SalarySnapshot, StatusChange, UserRole,
};

use crate::auth::AuthUser;
use crate::authz::{is_admin, require_role};
use crate::error::{ApiError, ApiResult};
use crate::response::ApiResponse;
use crate::sanitize::{is_valid_id, non_empty, sanitize_search_term};
use crate::state::AppState;

// ============================================================================
// Views
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationView {
    pub id: String,
    pub job: String,
    pub company: String,
    pub applicant: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_letter: Option<String>,
    pub status: ApplicationStatus,
    /// Omitted in the applicant's own view.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewed: Option<bool>,
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

impl ApplicationView {
    /// Full view, for employers and admins.
    fn full(app: &Application) -> Self {
        Self::build(app, true)
    }

    /// Applicant view: the employer-side `viewed` flag is withheld.
    fn for_applicant(app: &Application) -> Self {
        Self::build(app, false)
    }

    fn build(app: &Application, include_viewed: bool) -> Self {
        Self {
            id: app.id.as_str().to_string(),
            job: app.job.as_str().to_string(),
            company: app.company.as_str().to_string(),
            applicant: app.applicant.as_str().to_string(),
            resume_url: app.resume_url.clone(),
            cover_letter: app.cover_letter.clone(),
            status: app.status,
            viewed: include_viewed.then_some(app.viewed),
            rejected_reason: app.rejected_reason.clone(),
            interview_date: app.interview_date,
            job_title_snapshot: app.job_title_snapshot.clone(),
            company_name_snapshot: app.company_name_snapshot.clone(),
            job_location_snapshot: app.job_location_snapshot.clone(),
            job_type_snapshot: app.job_type_snapshot,
            experience_level_snapshot: app.experience_level_snapshot,
            job_salary_snapshot: app.job_salary_snapshot.clone(),
            created_at: app.created_at,
            updated_at: app.updated_at,
        }
    }
}

fn parse_application_status(raw: &str) -> ApiResult<ApplicationStatus> {
    ApplicationStatus::parse(raw.trim()).ok_or_else(|| {
        let allowed: Vec<&str> = ApplicationStatus::ALL.iter().map(|s| s.as_str()).collect();
        ApiError::bad_request(format!(
            "Invalid status; allowed values are: {}",
            allowed.join(", ")
        ))
    })
}

// ============================================================================
// Apply
// ============================================================================

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRequest {
    #[validate(length(max = 5000, message = "cover letter too long"))]
    pub cover_letter: Option<String>,
    #[validate(length(max = 2000, message = "resume url too long"))]
    pub resume_url: Option<String>,
}

/// POST /api/applications/:jobId/apply (jobseeker)
///
/// Captures job/company snapshots at submission time; the record stays
/// historically accurate across later job edits. Uniqueness of
/// (job, applicant) is guaranteed by the store; the pre-check only makes
/// the common duplicate fast.
pub async fn apply_to_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(job_id): Path<String>,
    body: Option<Json<ApplyRequest>>,
) -> ApiResult<Response> {
    require_role(&auth, &[UserRole::Jobseeker])?;

    if !is_valid_id(&job_id) {
        return Err(ApiError::bad_request("Invalid job id"));
    }

    let body = body.map(|Json(b)| b).unwrap_or_default();
    body.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let job = state
        .jobs()
        .get(&JobId::from_string(job_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Job not found"))?;

    let now = Utc::now();
    if job.status != jhive_models::JobStatus::Open {
        return Err(ApiError::bad_request("This job is not accepting applications"));
    }
    if job.is_expired(now) {
        return Err(ApiError::bad_request("This job posting has expired"));
    }

    let applications = state.applications();

    // Best-effort pre-check; the create below is the authoritative guard
    if applications.exists_for(&job.id, &auth.id).await? {
        return Err(ApiError::conflict("You have already applied to this job"));
    }

    let company = state.companies().get(&job.company).await?;

    let mut application = Application::new(job.id.clone(), job.company.clone(), auth.id.clone());
    application.cover_letter = non_empty(body.cover_letter);

    // Resume snapshot: explicit URL wins, else the profile resume
    match non_empty(body.resume_url) {
        Some(url) => application.resume_url = Some(url),
        None => {
            if let Some(user) = state.users().get(&auth.id).await? {
                application.resume_url = user.resume_url;
                application.resume_key = user.resume_key;
            }
        }
    }

    application.job_title_snapshot = Some(job.title.clone());
    application.company_name_snapshot = company.map(|c| c.name);
    application.job_location_snapshot = Some(job.location.clone());
    application.job_type_snapshot = Some(job.job_type);
    application.experience_level_snapshot = Some(job.experience_level);
    application.job_salary_snapshot = Some(SalarySnapshot {
        min: job.salary.min,
        max: job.salary.max,
        currency: job.salary.currency.clone(),
    });

    match applications.create(&application).await {
        Ok(()) => {}
        Err(jhive_firestore::FirestoreError::AlreadyExists(_)) => {
            return Err(ApiError::conflict("You have already applied to this job"));
        }
        Err(e) => return Err(e.into()),
    }

    // Best-effort application counter on the job
    let jobs = state.jobs();
    let counted = job.id.clone();
    tokio::spawn(async move {
        let _ = jobs.adjust_application_count(&counted, 1).await;
    });

    Ok(ApiResponse::created(
        json!({ "application": ApplicationView::for_applicant(&application) }),
        "Application submitted",
    )
    .into_response())
}

// ============================================================================
// Listings
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ListMyApplicationsParams {
    pub q: Option<String>,
    pub status: Option<String>,
    pub company: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ApplicationListData {
    pub meta: PageMeta,
    pub applications: Vec<ApplicationView>,
}

/// GET /api/applications/my (jobseeker)
pub async fn list_my_applications(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<ListMyApplicationsParams>,
) -> ApiResult<Response> {
    require_role(&auth, &[UserRole::Jobseeker])?;

    let status = match params.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(parse_application_status(raw)?),
    };

    if let Some(company) = params.company.as_deref() {
        if !is_valid_id(company) {
            return Err(ApiError::bad_request("Invalid company id"));
        }
    }

    let query = MyApplicationsQuery {
        applicant: auth.id.as_str().to_string(),
        status,
        company: params.company,
        q: params.q.as_deref().and_then(sanitize_search_term),
        page: params.page,
        limit: params.limit,
    };

    let (applications, meta) = state.applications().list_for_applicant(&query).await?;
    let views: Vec<ApplicationView> = applications
        .iter()
        .map(ApplicationView::for_applicant)
        .collect();

    Ok(ApiResponse::ok(ApplicationListData {
        meta,
        applications: views,
    })
    .into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct ListJobApplicationsParams {
    pub status: Option<String>,
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Fetch a job and check the requester may see its applications.
async fn authorize_job_access(
    state: &AppState,
    auth: &AuthUser,
    job_id: &str,
) -> ApiResult<jhive_models::Job> {
    if !is_valid_id(job_id) {
        return Err(ApiError::bad_request("Invalid job id"));
    }

    let job = state
        .jobs()
        .get(&JobId::from_string(job_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Job not found"))?;

    if !is_admin(auth) && job.created_by != auth.id {
        return Err(ApiError::forbidden("Forbidden: you are not the owner"));
    }

    Ok(job)
}

/// GET /api/applications/job/:jobId (admin or job creator)
pub async fn list_job_applications(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(job_id): Path<String>,
    Query(params): Query<ListJobApplicationsParams>,
) -> ApiResult<Response> {
    let job = authorize_job_access(&state, &auth, &job_id).await?;

    let status = match params.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(parse_application_status(raw)?),
    };

    let query = JobApplicationsQuery {
        job: job.id.as_str().to_string(),
        status,
        sort: params.sort,
        page: params.page,
        limit: params.limit,
    };

    let (applications, meta) = state.applications().list_for_job(&query).await?;
    let views: Vec<ApplicationView> = applications.iter().map(ApplicationView::full).collect();

    Ok(ApiResponse::ok(ApplicationListData {
        meta,
        applications: views,
    })
    .into_response())
}

// ============================================================================
// Stats
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusStats {
    pub applied: u64,
    pub shortlisted: u64,
    pub interview: u64,
    pub rejected: u64,
    pub hired: u64,
}

impl StatusStats {
    fn from_counts(counts: &std::collections::HashMap<ApplicationStatus, u64>) -> Self {
        let get = |s: ApplicationStatus| counts.get(&s).copied().unwrap_or(0);
        Self {
            applied: get(ApplicationStatus::Applied),
            shortlisted: get(ApplicationStatus::Shortlisted),
            interview: get(ApplicationStatus::Interview),
            rejected: get(ApplicationStatus::Rejected),
            hired: get(ApplicationStatus::Hired),
        }
    }
}

/// GET /api/applications/job/:jobId/stats (admin or job creator)
pub async fn get_job_application_stats(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(job_id): Path<String>,
) -> ApiResult<Response> {
    let job = authorize_job_access(&state, &auth, &job_id).await?;

    let counts = state.applications().status_counts_for_job(&job.id).await?;

    Ok(ApiResponse::ok(json!({
        "job": { "id": job.id.as_str(), "title": job.title },
        "stats": StatusStats::from_counts(&counts),
    }))
    .into_response())
}

/// GET /api/applications/my/stats (jobseeker)
pub async fn get_my_application_stats(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Response> {
    require_role(&auth, &[UserRole::Jobseeker])?;

    let counts = state
        .applications()
        .status_counts_for_applicant(&auth.id)
        .await?;

    Ok(ApiResponse::ok(json!({ "stats": StatusStats::from_counts(&counts) })).into_response())
}

// ============================================================================
// Detail
// ============================================================================

/// GET /api/applications/:id (applicant, job creator, or admin)
pub async fn get_application(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    if !is_valid_id(&id) {
        return Err(ApiError::bad_request("Invalid application id"));
    }

    let application = state
        .applications()
        .get(&ApplicationId::from_string(id))
        .await?
        .ok_or_else(|| ApiError::not_found("Application not found"))?;

    let is_applicant = application.applicant == auth.id;

    let is_employer_owner = match state.jobs().get(&application.job).await? {
        Some(job) => job.created_by == auth.id,
        None => false,
    };

    if !is_applicant && !is_employer_owner && !is_admin(&auth) {
        return Err(ApiError::forbidden("Forbidden"));
    }

    let view = if is_applicant && !is_employer_owner && !is_admin(&auth) {
        ApplicationView::for_applicant(&application)
    } else {
        ApplicationView::full(&application)
    };

    Ok(ApiResponse::ok(json!({ "application": view })).into_response())
}

// ============================================================================
// Status updates
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: String,
    #[validate(length(max = 2000, message = "rejection reason too long"))]
    pub rejected_reason: Option<String>,
    pub interview_date: Option<String>,
}

/// Fetch an application and check the requester may manage it (job
/// creator or admin).
async fn authorize_application_management(
    state: &AppState,
    auth: &AuthUser,
    id: &str,
) -> ApiResult<Application> {
    if !is_valid_id(id) {
        return Err(ApiError::bad_request("Invalid application id"));
    }

    let application = state
        .applications()
        .get(&ApplicationId::from_string(id))
        .await?
        .ok_or_else(|| ApiError::not_found("Application not found"))?;

    let is_employer_owner = match state.jobs().get(&application.job).await? {
        Some(job) => job.created_by == auth.id,
        None => false,
    };

    if !is_employer_owner && !is_admin(auth) {
        return Err(ApiError::forbidden(
            "Forbidden: you are not allowed to update this application",
        ));
    }

    Ok(application)
}

/// PATCH /api/applications/:id/status (employer owner or admin)
pub async fn update_application_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateStatusRequest>,
) -> ApiResult<Response> {
    require_role(&auth, &[UserRole::Employer, UserRole::Admin])?;

    body.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let status = parse_application_status(&body.status)?;

    let interview_date = match body.interview_date.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| ApiError::bad_request("Invalid interviewDate"))?,
        ),
        None => None,
    };

    let mut application = authorize_application_management(&state, &auth, &id).await?;

    application
        .apply_transition(StatusChange {
            status,
            rejected_reason: body.rejected_reason,
            interview_date,
        })
        .map_err(|e| ApiError::conflict(e.to_string()))?;

    state.applications().update(&application).await?;

    Ok(ApiResponse::ok_with(
        json!({ "application": ApplicationView::full(&application) }),
        "Application status updated successfully",
    )
    .into_response())
}

/// PATCH /api/applications/:id/viewed (employer owner or admin)
pub async fn mark_application_viewed(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    require_role(&auth, &[UserRole::Employer, UserRole::Admin])?;

    let mut application = authorize_application_management(&state, &auth, &id).await?;

    // Idempotent
    if !application.viewed {
        state.applications().set_viewed(&application.id).await?;
        application.viewed = true;
        application.updated_at = Utc::now();
    }

    Ok(ApiResponse::ok_with(
        json!({ "application": ApplicationView::full(&application) }),
        "Application marked as viewed",
    )
    .into_response())
}

// ============================================================================
// Delete
// ============================================================================

/// DELETE /api/applications/:id (the applicant, jobseeker role)
pub async fn delete_my_application(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    require_role(&auth, &[UserRole::Jobseeker])?;

    if !is_valid_id(&id) {
        return Err(ApiError::bad_request("Invalid application id"));
    }

    let applications = state.applications();
    let application = applications
        .get(&ApplicationId::from_string(id))
        .await?
        .ok_or_else(|| ApiError::not_found("Application not found"))?;

    if application.applicant != auth.id {
        return Err(ApiError::forbidden(
            "Forbidden: you can only delete your own application",
        ));
    }

    applications.delete(&application.id).await?;

    // Best-effort application counter on the job
    let jobs = state.jobs();
    let job_id = application.job.clone();
    tokio::spawn(async move {
        let _ = jobs.adjust_application_count(&job_id, -1).await;
    });

    Ok(ApiResponse::message(StatusCode::OK, "Application deleted successfully").into_response())
}
