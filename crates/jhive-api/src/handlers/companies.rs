//! Company profile handlers.

use axum::extract::{Path, Query, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use chrono::{DateTime, Utc};
use jhive_firestore::companies_repo::CompanyListQuery;
use jhive_models::{Company, CompanyId, CompanyLocation, PageMeta, UserRole};
use jhive_storage::MediaKind;

use crate::auth::AuthUser;
use crate::authz::{require_role, require_role_or_owner};
use crate::error::{ApiError, ApiResult};
use crate::extract::{json_or_multipart, FilePart};
use crate::response::ApiResponse;
use crate::sanitize::{is_valid_id, is_valid_slug, non_empty, sanitize_search_term, sanitize_text};
use crate::state::AppState;

// ============================================================================
// Views
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyView {
    pub id: String,
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
    pub location: CompanyLocation,
    pub owner: String,
    pub verified: bool,
    pub jobs_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Company> for CompanyView {
    fn from(company: &Company) -> Self {
        Self {
            id: company.id.as_str().to_string(),
            name: company.name.clone(),
            slug: company.slug.clone(),
            description: company.description.clone(),
            website: company.website.clone(),
            industry: company.industry.clone(),
            logo_url: company.logo_url.clone(),
            location: company.location.clone(),
            owner: company.owner.as_str().to_string(),
            verified: company.verified,
            jobs_count: company.jobs_count,
            created_at: company.created_at,
            updated_at: company.updated_at,
        }
    }
}

// ============================================================================
// Create
// ============================================================================

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCompanyRequest {
    #[validate(length(min = 2, max = 200, message = "name must be 2-200 characters"))]
    pub name: String,
    #[validate(length(max = 5000, message = "description too long"))]
    pub description: Option<String>,
    #[validate(length(max = 300, message = "website too long"))]
    pub website: Option<String>,
    pub industry: Option<String>,
    pub location: Option<LocationPatch>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationPatch {
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

fn apply_location(location: &mut CompanyLocation, patch: LocationPatch) {
    if let Some(city) = patch.city {
        location.city = non_empty(Some(city));
    }
    if let Some(state) = patch.state {
        location.state = non_empty(Some(state));
    }
    if let Some(country) = patch.country {
        location.country = non_empty(Some(country));
    }
}

/// Upload a logo, converting unsupported types to 400s.
async fn upload_logo(
    state: &AppState,
    company_id: &CompanyId,
    logo: &FilePart,
) -> ApiResult<jhive_storage::StoredObject> {
    state
        .storage
        .upload(
            MediaKind::CompanyLogo,
            company_id.as_str(),
            logo.data.clone(),
            &logo.content_type,
        )
        .await
        .map_err(|e| match e {
            jhive_storage::StorageError::UnsupportedContentType(_) => {
                ApiError::bad_request("Invalid file type.")
            }
            other => ApiError::from(other),
        })
}

/// POST /api/companies (employer or admin)
pub async fn create_company(
    State(state): State<AppState>,
    auth: AuthUser,
    request: Request,
) -> ApiResult<Response> {
    require_role(&auth, &[UserRole::Employer, UserRole::Admin])?;

    let parsed = json_or_multipart::<CreateCompanyRequest>(&state, request).await?;
    let body = parsed.body;
    body.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let name = sanitize_text(body.name.trim());
    if name.is_empty() {
        return Err(ApiError::bad_request("Company name is required"));
    }

    let companies = state.companies();

    // Best-effort duplicate probe; the slug namespace is the real guard
    if companies.name_taken(&name).await? {
        return Err(ApiError::conflict("Company name already exists"));
    }

    let slug = companies.unique_slug(&name).await?;

    let mut company = Company::new(name, slug, auth.id.clone());
    company.description = non_empty(body.description);
    company.website = non_empty(body.website);
    company.industry = non_empty(body.industry);
    if let Some(patch) = body.location {
        apply_location(&mut company.location, patch);
    }

    let mut uploaded_key: Option<String> = None;
    if let Some(logo) = parsed.files.get("logo") {
        let stored = upload_logo(&state, &company.id, logo).await?;
        uploaded_key = Some(stored.key.clone());
        company.logo_url = Some(stored.url);
        company.logo_key = Some(stored.key);
    }

    if let Err(e) = companies.create(&company).await {
        // Roll back the uploaded logo; cleanup is best-effort
        if let Some(key) = uploaded_key {
            state.storage.delete_best_effort(&key).await;
        }
        return Err(e.into());
    }

    Ok(ApiResponse::created(
        json!({ "company": CompanyView::from(&company) }),
        "Company created",
    )
    .into_response())
}

// ============================================================================
// List / detail
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ListCompaniesParams {
    pub q: Option<String>,
    pub owner: Option<String>,
    pub industry: Option<String>,
    pub verified: Option<String>,
    #[serde(rename = "location.city")]
    pub city: Option<String>,
    #[serde(rename = "location.state")]
    pub state: Option<String>,
    #[serde(rename = "location.country")]
    pub country: Option<String>,
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct CompanyListData {
    pub meta: PageMeta,
    pub companies: Vec<CompanyView>,
}

fn parse_bool_param(raw: &str, name: &str) -> ApiResult<bool> {
    match raw.to_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ApiError::bad_request(format!(
            "Invalid {} value; use true or false",
            name
        ))),
    }
}

/// GET /api/companies (public)
pub async fn list_companies(
    State(state): State<AppState>,
    Query(params): Query<ListCompaniesParams>,
) -> ApiResult<Response> {
    if let Some(owner) = params.owner.as_deref() {
        if !is_valid_id(owner) {
            return Err(ApiError::bad_request("Invalid owner id"));
        }
    }

    let verified = params
        .verified
        .as_deref()
        .map(|v| parse_bool_param(v, "verified"))
        .transpose()?;

    let query = CompanyListQuery {
        q: params.q.as_deref().and_then(sanitize_search_term),
        owner: params.owner,
        industry: non_empty(params.industry),
        verified,
        city: non_empty(params.city),
        state: non_empty(params.state),
        country: non_empty(params.country),
        sort: params.sort,
        page: params.page,
        limit: params.limit,
    };

    let (companies, meta) = state.companies().list(&query).await?;
    let views: Vec<CompanyView> = companies.iter().map(CompanyView::from).collect();

    Ok(ApiResponse::ok(CompanyListData {
        meta,
        companies: views,
    })
    .into_response())
}

/// Resolve an identifier path segment as an ID first, then as a slug.
async fn find_company(state: &AppState, id_or_slug: &str) -> ApiResult<Company> {
    let companies = state.companies();

    if Uuid::parse_str(id_or_slug).is_ok() {
        if let Some(company) = companies.get(&CompanyId::from_string(id_or_slug)).await? {
            return Ok(company);
        }
    } else if is_valid_slug(id_or_slug) {
        if let Some(company) = companies.get_by_slug(id_or_slug).await? {
            return Ok(company);
        }
    } else {
        return Err(ApiError::bad_request("Company identifier is required"));
    }

    Err(ApiError::not_found("Company not found"))
}

/// GET /api/companies/:idOrSlug (public)
pub async fn get_company(
    State(state): State<AppState>,
    Path(id_or_slug): Path<String>,
) -> ApiResult<Response> {
    let company = find_company(&state, id_or_slug.trim()).await?;
    Ok(ApiResponse::ok(json!({ "company": CompanyView::from(&company) })).into_response())
}

// ============================================================================
// Update / delete
// ============================================================================

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCompanyRequest {
    #[validate(length(min = 2, max = 200, message = "name must be 2-200 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 5000, message = "description too long"))]
    pub description: Option<String>,
    #[validate(length(max = 300, message = "website too long"))]
    pub website: Option<String>,
    pub industry: Option<String>,
    pub location: Option<LocationPatch>,
}

/// PATCH /api/companies/:id (admin or owner)
pub async fn update_company(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    request: Request,
) -> ApiResult<Response> {
    if !is_valid_id(&id) {
        return Err(ApiError::bad_request("Invalid company id"));
    }

    let companies = state.companies();
    let mut company = companies
        .get(&CompanyId::from_string(id))
        .await?
        .ok_or_else(|| ApiError::not_found("Company not found"))?;

    require_role_or_owner(&auth, &[UserRole::Admin], &company.owner)?;

    let parsed = json_or_multipart::<UpdateCompanyRequest>(&state, request).await?;
    let body = parsed.body;
    body.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    if let Some(name) = body.name {
        let name = sanitize_text(name.trim());
        if name.is_empty() {
            return Err(ApiError::bad_request("Company name cannot be empty"));
        }
        if name != company.name {
            if companies.name_taken(&name).await? {
                return Err(ApiError::conflict("Company name already exists"));
            }
            company.slug = companies.unique_slug(&name).await?;
            company.name = name;
        }
    }
    if let Some(description) = body.description {
        company.description = non_empty(Some(description));
    }
    if let Some(website) = body.website {
        company.website = non_empty(Some(website));
    }
    if let Some(industry) = body.industry {
        company.industry = non_empty(Some(industry));
    }
    if let Some(patch) = body.location {
        apply_location(&mut company.location, patch);
    }

    let mut uploaded_key: Option<String> = None;
    let old_logo_key = company.logo_key.clone();
    if let Some(logo) = parsed.files.get("logo") {
        let stored = upload_logo(&state, &company.id, logo).await?;
        uploaded_key = Some(stored.key.clone());
        company.logo_url = Some(stored.url);
        company.logo_key = Some(stored.key);
    }

    company.updated_at = Utc::now();

    if let Err(e) = companies.update(&company).await {
        if let Some(key) = uploaded_key {
            state.storage.delete_best_effort(&key).await;
        }
        return Err(e.into());
    }

    // Replaced logo cleanup never blocks the response
    if uploaded_key.is_some() {
        if let Some(old_key) = old_logo_key {
            state.storage.delete_best_effort(&old_key).await;
        }
    }

    Ok(ApiResponse::ok_with(
        json!({ "company": CompanyView::from(&company) }),
        "Company updated successfully",
    )
    .into_response())
}

/// DELETE /api/companies/:id (admin or owner)
pub async fn delete_company(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    if !is_valid_id(&id) {
        return Err(ApiError::bad_request("Invalid company id"));
    }

    let companies = state.companies();
    let company = companies
        .get(&CompanyId::from_string(id))
        .await?
        .ok_or_else(|| ApiError::not_found("Company not found"))?;

    require_role_or_owner(&auth, &[UserRole::Admin], &company.owner)?;

    companies.delete(&company.id).await?;

    if let Some(logo_key) = company.logo_key {
        state.storage.delete_best_effort(&logo_key).await;
    }

    Ok(ApiResponse::message(StatusCode::OK, "Company deleted successfully").into_response())
}

// ============================================================================
// Verification (admin)
// ============================================================================

/// POST /api/companies/:id/verify (admin)
pub async fn verify_company(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    set_company_verified(&state, &auth, &id, true).await
}

/// POST /api/companies/:id/unverify (admin)
pub async fn unverify_company(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    set_company_verified(&state, &auth, &id, false).await
}

async fn set_company_verified(
    state: &AppState,
    auth: &AuthUser,
    id: &str,
    verified: bool,
) -> ApiResult<Response> {
    require_role(auth, &[UserRole::Admin])?;

    if !is_valid_id(id) {
        return Err(ApiError::bad_request("Invalid company id"));
    }

    let companies = state.companies();
    let mut company = companies
        .get(&CompanyId::from_string(id))
        .await?
        .ok_or_else(|| ApiError::not_found("Company not found"))?;

    if company.verified == verified {
        let message = if verified {
            "Company already verified"
        } else {
            "Company already unverified"
        };
        return Ok(
            ApiResponse::ok_with(json!({ "company": CompanyView::from(&company) }), message)
                .into_response(),
        );
    }

    companies.set_verified(&company.id, verified).await?;
    company.verified = verified;
    company.updated_at = Utc::now();

    let message = if verified {
        "Company verified successfully"
    } else {
        "Company has been unverified"
    };

    Ok(
        ApiResponse::ok_with(json!({ "company": CompanyView::from(&company) }), message)
            .into_response(),
    )
}
