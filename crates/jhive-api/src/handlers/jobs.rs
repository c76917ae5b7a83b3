//! Job posting handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use jhive_firestore::jobs_repo::JobListQuery;
use jhive_models::{
    CompanyId, ExperienceLevel, Job, JobId, JobLocation, JobStatus, JobType, PageMeta, Salary,
    UserRole,
};

use crate::auth::AuthUser;
use crate::authz::{is_admin, require_role, require_role_or_owner};
use crate::error::{ApiError, ApiResult};
use crate::extract::StringOrList;
use crate::response::ApiResponse;
use crate::sanitize::{is_valid_id, is_valid_slug, non_empty, sanitize_search_term, sanitize_text};
use crate::state::AppState;

// ============================================================================
// Views
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub requirements: Vec<String>,
    pub responsibilities: Vec<String>,
    pub skills: Vec<String>,
    pub salary: Salary,
    pub job_type: JobType,
    pub experience_level: ExperienceLevel,
    pub location: JobLocation,
    pub status: JobStatus,
    pub company: String,
    pub created_by: String,
    pub application_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Job> for JobView {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.as_str().to_string(),
            title: job.title.clone(),
            slug: job.slug.clone(),
            description: job.description.clone(),
            requirements: job.requirements.clone(),
            responsibilities: job.responsibilities.clone(),
            skills: job.skills.clone(),
            salary: job.salary.clone(),
            job_type: job.job_type,
            experience_level: job.experience_level,
            location: job.location.clone(),
            status: job.status,
            company: job.company.as_str().to_string(),
            created_by: job.created_by.as_str().to_string(),
            application_count: job.application_count,
            expires_at: job.expires_at,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

// ============================================================================
// Shared input parsing
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalaryInput {
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub currency: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationInput {
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub remote: Option<bool>,
}

fn parse_salary(input: SalaryInput, fallback_currency: &str) -> ApiResult<Salary> {
    if let (Some(min), Some(max)) = (input.min, input.max) {
        if min > max {
            return Err(ApiError::bad_request(
                "salary.min cannot be greater than salary.max",
            ));
        }
    }

    Ok(Salary {
        min: input.min,
        max: input.max,
        currency: non_empty(input.currency).unwrap_or_else(|| fallback_currency.to_string()),
    })
}

fn apply_location(location: &mut JobLocation, input: LocationInput) {
    if let Some(city) = input.city {
        location.city = non_empty(Some(city));
    }
    if let Some(state) = input.state {
        location.state = non_empty(Some(state));
    }
    if let Some(country) = input.country {
        location.country = non_empty(Some(country));
    }
    if let Some(remote) = input.remote {
        location.remote = remote;
    }
}

fn parse_status(raw: &str) -> ApiResult<JobStatus> {
    JobStatus::parse(raw.trim()).ok_or_else(|| {
        ApiError::bad_request("Invalid status; allowed values are open, closed, paused")
    })
}

fn parse_expiry(raw: &str) -> ApiResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ApiError::bad_request("Invalid expiresAt date"))
}

// ============================================================================
// Create
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    #[validate(length(min = 3, max = 300, message = "title must be 3-300 characters"))]
    pub title: String,
    #[validate(length(min = 10, max = 20000, message = "description must be 10-20000 characters"))]
    pub description: String,
    pub company: String,
    pub requirements: Option<StringOrList>,
    pub responsibilities: Option<StringOrList>,
    pub skills: Option<StringOrList>,
    pub salary: Option<SalaryInput>,
    pub job_type: Option<String>,
    pub experience_level: Option<String>,
    pub location: Option<LocationInput>,
    pub expires_at: Option<String>,
}

/// POST /api/jobs (employer or admin)
///
/// Employers can only post for the company they own.
pub async fn create_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateJobRequest>,
) -> ApiResult<Response> {
    require_role(&auth, &[UserRole::Employer, UserRole::Admin])?;

    body.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let title = sanitize_text(body.title.trim());
    if title.is_empty() {
        return Err(ApiError::bad_request("Job title is required"));
    }
    let description = sanitize_text(body.description.trim());
    if description.is_empty() {
        return Err(ApiError::bad_request("Job description is required"));
    }

    let company_id = body.company.trim();
    if !is_valid_id(company_id) {
        return Err(ApiError::bad_request("Valid company id is required"));
    }

    let company = state
        .companies()
        .get(&CompanyId::from_string(company_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Company not found"))?;

    if auth.role == UserRole::Employer && company.owner != auth.id {
        return Err(ApiError::forbidden(
            "You are not allowed to post jobs for this company",
        ));
    }

    let jobs = state.jobs();
    let slug = jobs.unique_slug(&title).await?;

    let mut job = Job::new(title, slug, description, company.id.clone(), auth.id.clone());

    if let Some(requirements) = body.requirements {
        job.requirements = requirements.into_vec();
    }
    if let Some(responsibilities) = body.responsibilities {
        job.responsibilities = responsibilities.into_vec();
    }
    if let Some(skills) = body.skills {
        job.skills = skills.into_vec();
    }
    if let Some(salary) = body.salary {
        job.salary = parse_salary(salary, "INR")?;
    }
    if let Some(job_type) = body.job_type.as_deref() {
        job.job_type = JobType::parse(job_type.trim())
            .ok_or_else(|| ApiError::bad_request("Invalid jobType"))?;
    }
    if let Some(level) = body.experience_level.as_deref() {
        job.experience_level = ExperienceLevel::parse(level.trim())
            .ok_or_else(|| ApiError::bad_request("Invalid experienceLevel"))?;
    }
    if let Some(location) = body.location {
        apply_location(&mut job.location, location);
    }
    if let Some(expires_at) = body.expires_at.as_deref().filter(|s| !s.is_empty()) {
        job.expires_at = Some(parse_expiry(expires_at)?);
    }

    jobs.create(&job).await?;

    // Best-effort jobs counter on the company
    let companies = state.companies();
    let counted = company.id.clone();
    tokio::spawn(async move {
        let _ = companies.adjust_jobs_count(&counted, 1).await;
    });

    Ok(ApiResponse::created(json!({ "job": JobView::from(&job) }), "Job created").into_response())
}

// ============================================================================
// List / detail
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListJobsParams {
    pub q: Option<String>,
    pub company: Option<String>,
    pub job_type: Option<String>,
    pub experience_level: Option<String>,
    #[serde(rename = "location.city")]
    pub city: Option<String>,
    #[serde(rename = "location.state")]
    pub state: Option<String>,
    #[serde(rename = "location.country")]
    pub country: Option<String>,
    pub remote: Option<String>,
    pub status: Option<String>,
    pub min_salary: Option<i64>,
    pub max_salary: Option<i64>,
    pub owner: Option<String>,
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct JobListData {
    pub meta: PageMeta,
    pub jobs: Vec<JobView>,
}

fn parse_list_filters(params: &ListJobsParams) -> ApiResult<JobListQuery> {
    if let Some(company) = params.company.as_deref() {
        if !is_valid_id(company) {
            return Err(ApiError::bad_request("Invalid company id"));
        }
    }

    let job_type = match params.job_type.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => {
            Some(JobType::parse(raw).ok_or_else(|| ApiError::bad_request("Invalid jobType"))?)
        }
    };

    let experience_level = match params.experience_level.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            ExperienceLevel::parse(raw)
                .ok_or_else(|| ApiError::bad_request("Invalid experienceLevel"))?,
        ),
    };

    let remote = match params.remote.as_deref().map(str::to_lowercase).as_deref() {
        None => None,
        Some("true") | Some("1") => Some(true),
        Some("false") | Some("0") => Some(false),
        Some(_) => {
            return Err(ApiError::bad_request("Invalid remote value; use true or false"))
        }
    };

    let status = match params.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(parse_status(raw)?),
    };

    if let (Some(min), Some(max)) = (params.min_salary, params.max_salary) {
        if min > max {
            return Err(ApiError::bad_request(
                "minSalary cannot be greater than maxSalary",
            ));
        }
    }

    Ok(JobListQuery {
        q: params.q.as_deref().and_then(sanitize_search_term),
        company: params.company.clone(),
        created_by: None,
        job_type,
        experience_level,
        city: params.city.clone().filter(|s| !s.trim().is_empty()),
        state: params.state.clone().filter(|s| !s.trim().is_empty()),
        country: params.country.clone().filter(|s| !s.trim().is_empty()),
        remote,
        status,
        default_open: false,
        min_salary: params.min_salary,
        max_salary: params.max_salary,
        sort: params.sort.clone(),
        page: params.page,
        limit: params.limit,
    })
}

/// GET /api/jobs (public)
///
/// Without an explicit status filter only open jobs are returned.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<ListJobsParams>,
) -> ApiResult<Response> {
    let mut query = parse_list_filters(&params)?;
    query.default_open = true;

    let (jobs, meta) = state.jobs().list(&query).await?;
    let views: Vec<JobView> = jobs.iter().map(JobView::from).collect();

    Ok(ApiResponse::ok(JobListData { meta, jobs: views }).into_response())
}

/// GET /api/jobs/my (employer: own jobs; admin: all, optional owner filter)
pub async fn list_my_jobs(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<ListJobsParams>,
) -> ApiResult<Response> {
    require_role(&auth, &[UserRole::Employer, UserRole::Admin])?;

    let mut query = parse_list_filters(&params)?;

    if is_admin(&auth) {
        if let Some(owner) = params.owner.as_deref() {
            if !is_valid_id(owner) {
                return Err(ApiError::bad_request("Invalid owner id"));
            }
            query.created_by = Some(owner.to_string());
        }
    } else {
        query.created_by = Some(auth.id.as_str().to_string());
    }

    let (jobs, meta) = state.jobs().list(&query).await?;
    let views: Vec<JobView> = jobs.iter().map(JobView::from).collect();

    Ok(ApiResponse::ok(JobListData { meta, jobs: views }).into_response())
}

/// Resolve an identifier path segment as an ID first, then as a slug.
pub(crate) async fn find_job(state: &AppState, id_or_slug: &str) -> ApiResult<Job> {
    let jobs = state.jobs();

    if Uuid::parse_str(id_or_slug).is_ok() {
        if let Some(job) = jobs.get(&JobId::from_string(id_or_slug)).await? {
            return Ok(job);
        }
    } else if is_valid_slug(id_or_slug) {
        if let Some(job) = jobs.get_by_slug(id_or_slug).await? {
            return Ok(job);
        }
    } else {
        return Err(ApiError::bad_request("Job identifier is required"));
    }

    Err(ApiError::not_found("Job not found"))
}

/// GET /api/jobs/:idOrSlug (public)
pub async fn get_job(
    State(state): State<AppState>,
    Path(id_or_slug): Path<String>,
) -> ApiResult<Response> {
    let job = find_job(&state, id_or_slug.trim()).await?;
    Ok(ApiResponse::ok(json!({ "job": JobView::from(&job) })).into_response())
}

// ============================================================================
// Update / delete
// ============================================================================

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateJobRequest {
    #[validate(length(min = 3, max = 300, message = "title must be 3-300 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 10, max = 20000, message = "description must be 10-20000 characters"))]
    pub description: Option<String>,
    pub requirements: Option<StringOrList>,
    pub responsibilities: Option<StringOrList>,
    pub skills: Option<StringOrList>,
    pub salary: Option<SalaryInput>,
    pub job_type: Option<String>,
    pub experience_level: Option<String>,
    pub location: Option<LocationInput>,
    pub status: Option<String>,
    /// Empty string clears the expiry.
    pub expires_at: Option<String>,
}

/// PATCH /api/jobs/:id (admin or creator)
pub async fn update_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateJobRequest>,
) -> ApiResult<Response> {
    if !is_valid_id(&id) {
        return Err(ApiError::bad_request("Invalid job id"));
    }

    body.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let jobs = state.jobs();
    let mut job = jobs
        .get(&JobId::from_string(id))
        .await?
        .ok_or_else(|| ApiError::not_found("Job not found"))?;

    require_role_or_owner(&auth, &[UserRole::Admin], &job.created_by)?;

    if let Some(title) = body.title {
        let title = sanitize_text(title.trim());
        if title.is_empty() {
            return Err(ApiError::bad_request("Job title cannot be empty"));
        }
        if title != job.title {
            job.slug = jobs.unique_slug(&title).await?;
            job.title = title;
        }
    }
    if let Some(description) = body.description {
        let description = sanitize_text(description.trim());
        if description.is_empty() {
            return Err(ApiError::bad_request("Job description cannot be empty"));
        }
        job.description = description;
    }
    if let Some(requirements) = body.requirements {
        job.requirements = requirements.into_vec();
    }
    if let Some(responsibilities) = body.responsibilities {
        job.responsibilities = responsibilities.into_vec();
    }
    if let Some(skills) = body.skills {
        job.skills = skills.into_vec();
    }
    if let Some(salary) = body.salary {
        let currency = job.salary.currency.clone();
        job.salary = parse_salary(salary, &currency)?;
    }
    if let Some(job_type) = body.job_type.as_deref() {
        job.job_type = JobType::parse(job_type.trim())
            .ok_or_else(|| ApiError::bad_request("Invalid jobType"))?;
    }
    if let Some(level) = body.experience_level.as_deref() {
        job.experience_level = ExperienceLevel::parse(level.trim())
            .ok_or_else(|| ApiError::bad_request("Invalid experienceLevel"))?;
    }
    if let Some(location) = body.location {
        apply_location(&mut job.location, location);
    }
    if let Some(status) = body.status.as_deref() {
        job.status = parse_status(status)?;
    }
    if let Some(expires_at) = body.expires_at.as_deref() {
        job.expires_at = if expires_at.is_empty() {
            None
        } else {
            Some(parse_expiry(expires_at)?)
        };
    }

    job.updated_at = Utc::now();
    jobs.update(&job).await?;

    Ok(
        ApiResponse::ok_with(json!({ "job": JobView::from(&job) }), "Job updated successfully")
            .into_response(),
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateJobStatusRequest {
    pub status: String,
}

/// PATCH /api/jobs/:id/status (admin or creator)
pub async fn update_job_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateJobStatusRequest>,
) -> ApiResult<Response> {
    if !is_valid_id(&id) {
        return Err(ApiError::bad_request("Invalid job id"));
    }

    let status = parse_status(&body.status)?;

    let jobs = state.jobs();
    let mut job = jobs
        .get(&JobId::from_string(id))
        .await?
        .ok_or_else(|| ApiError::not_found("Job not found"))?;

    require_role_or_owner(&auth, &[UserRole::Admin], &job.created_by)?;

    jobs.update_status(&job.id, status).await?;
    job.status = status;
    job.updated_at = Utc::now();

    Ok(ApiResponse::ok_with(
        json!({ "job": JobView::from(&job) }),
        "Job status updated successfully",
    )
    .into_response())
}

/// DELETE /api/jobs/:id (admin or creator)
pub async fn delete_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    if !is_valid_id(&id) {
        return Err(ApiError::bad_request("Invalid job id"));
    }

    let jobs = state.jobs();
    let job = jobs
        .get(&JobId::from_string(id))
        .await?
        .ok_or_else(|| ApiError::not_found("Job not found"))?;

    require_role_or_owner(&auth, &[UserRole::Admin], &job.created_by)?;

    jobs.delete(&job.id).await?;

    // Best-effort jobs counter on the company
    let companies = state.companies();
    let company_id = job.company.clone();
    tokio::spawn(async move {
        let _ = companies.adjust_jobs_count(&company_id, -1).await;
    });

    Ok(ApiResponse::message(StatusCode::OK, "Job deleted successfully").into_response())
}
