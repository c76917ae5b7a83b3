//! User account and session handlers.

use axum::extract::{Path, Query, Request, State};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use validator::Validate;

use jhive_firestore::users_repo::UserListQuery;
use jhive_models::{normalize_email, PageMeta, User, UserId, UserLocation, UserRole};
use jhive_storage::MediaKind;

use crate::auth::{
    clear_refresh_cookie, generate_otp, hash_token, refresh_cookie, AuthUser, OptionalAuthUser,
    REFRESH_COOKIE_NAME, REFRESH_TOKEN_HEADER,
};
use crate::authz::require_role;
use crate::error::{ApiError, ApiResult};
use crate::extract::{json_or_multipart, StringOrList};
use crate::metrics::record_auth_failure;
use crate::password::{hash_password, verify_password};
use crate::response::ApiResponse;
use crate::sanitize::{is_valid_id, non_empty, sanitize_search_term, sanitize_text};
use crate::state::AppState;

// ============================================================================
// Views
// ============================================================================

/// Full profile, visible to the account holder and admins. Never carries
/// credential or OTP state.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateUserView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    pub location: UserLocation,
    pub skills: Vec<String>,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for PrivateUserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.as_str().to_string(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            avatar_url: user.avatar_url.clone(),
            resume_url: user.resume_url.clone(),
            company: user.company.as_ref().map(|c| c.as_str().to_string()),
            bio: user.bio.clone(),
            location: user.location.clone(),
            skills: user.skills.clone(),
            email_verified: user.email_verified,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Reduced profile shown to other users.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUserView {
    pub id: String,
    pub name: String,
    pub role: UserRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    pub location: UserLocation,
    pub skills: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
}

impl From<&User> for PublicUserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.as_str().to_string(),
            name: user.name.clone(),
            role: user.role,
            avatar_url: user.avatar_url.clone(),
            bio: user.bio.clone(),
            location: user.location.clone(),
            skills: user.skills.clone(),
            company: user.company.as_ref().map(|c| c.as_str().to_string()),
        }
    }
}

/// Row in the admin listing.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Registration and verification
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 100, message = "name must be 2-100 characters"))]
    pub name: String,
    #[validate(email(message = "invalid email address"))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "password must be 8-128 characters"))]
    pub password: String,
    pub role: Option<String>,
}

/// POST /api/users/register
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> ApiResult<Response> {
    body.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let role = UserRole::from_registration(body.role.as_deref());
    let email = normalize_email(&body.email);
    let users = state.users();

    if let Some(existing) = users.get_by_email(&email).await? {
        if existing.email_verified {
            return Err(ApiError::conflict("Email already in use"));
        }
        if existing.verification_expired(Utc::now()) {
            // Stale unverified account: remove and allow re-registration
            users.delete(&existing).await?;
        } else {
            return Err(ApiError::conflict(
                "Email already in use. Please verify your email.",
            ));
        }
    }

    let password_hash =
        hash_password(&body.password).map_err(|e| ApiError::internal(e.to_string()))?;

    let mut user = User::new(sanitize_text(body.name.trim()), email.clone(), password_hash, role);

    let otp = generate_otp();
    let expires_min = state.config.verify_otp_expires_min;
    user.email_verification_otp_hash = Some(hash_token(&otp));
    user.email_verification_otp_expires =
        Some(Utc::now() + Duration::minutes(expires_min as i64));
    user.last_verification_sent_at = Some(Utc::now());

    users.create(&user).await?;

    state
        .mailer
        .send_verification_otp(&email, &otp, expires_min)
        .await?;

    info!("Registered user {} ({})", user.id, user.email);

    Ok(ApiResponse::message(
        StatusCode::CREATED,
        "User registered. OTP sent to email",
    )
    .into_response())
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VerifyEmailOtpRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(equal = 6, message = "otp must be 6 digits"))]
    pub otp: String,
}

/// POST /api/users/verify-email-otp
pub async fn verify_email_otp(
    State(state): State<AppState>,
    Json(body): Json<VerifyEmailOtpRequest>,
) -> ApiResult<Response> {
    body.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let users = state.users();
    let email = normalize_email(&body.email);

    let mut user = users
        .get_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::bad_request("Invalid email or OTP"))?;

    if user.email_verified {
        return Err(ApiError::bad_request("Email already verified"));
    }
    let Some(stored_hash) = user.email_verification_otp_hash.clone() else {
        return Err(ApiError::bad_request("No active OTP. Please request a new one."));
    };
    if user
        .email_verification_otp_expires
        .map(|exp| exp < Utc::now())
        .unwrap_or(true)
    {
        return Err(ApiError::bad_request("OTP expired. Please request a new one."));
    }
    if hash_token(&body.otp) != stored_hash {
        record_auth_failure("verify_otp");
        return Err(ApiError::bad_request("Invalid OTP"));
    }

    user.email_verified = true;
    user.clear_verification_otp();

    let access_token = state.tokens.sign_access_token(&user.id)?;
    let refresh_token = state.tokens.sign_refresh_token(&user.id)?;
    user.refresh_token_hash = Some(hash_token(&refresh_token));
    user.updated_at = Utc::now();

    users.update(&user).await?;

    Ok(session_response(
        &state,
        &refresh_token,
        ApiResponse::ok_with(
            json!({ "accessToken": access_token }),
            "Email verified. Logged in successfully",
        ),
    ))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResendVerificationRequest {
    #[validate(email)]
    pub email: String,
}

/// POST /api/users/resend-verification
///
/// Enumeration-safe: the response does not reveal whether the account
/// exists.
pub async fn resend_verification(
    State(state): State<AppState>,
    Json(body): Json<ResendVerificationRequest>,
) -> ApiResult<Response> {
    body.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let users = state.users();
    let email = normalize_email(&body.email);
    let neutral = "If an account exists, a verification code was sent";

    let Some(mut user) = users.get_by_email(&email).await? else {
        return Ok(ApiResponse::message(StatusCode::OK, neutral).into_response());
    };
    if user.email_verified {
        return Ok(ApiResponse::message(StatusCode::OK, "Email already verified").into_response());
    }

    let cooldown = Duration::minutes(state.config.resend_verify_min as i64);
    if let Some(last) = user.last_verification_sent_at {
        if Utc::now() - last < cooldown {
            return Err(ApiError::RateLimited);
        }
    }

    let otp = generate_otp();
    let expires_min = state.config.verify_otp_expires_min;
    user.email_verification_otp_hash = Some(hash_token(&otp));
    user.email_verification_otp_expires =
        Some(Utc::now() + Duration::minutes(expires_min as i64));
    user.last_verification_sent_at = Some(Utc::now());
    user.updated_at = Utc::now();

    users.update(&user).await?;

    state
        .mailer
        .send_verification_otp(&email, &otp, expires_min)
        .await?;

    Ok(ApiResponse::message(StatusCode::OK, neutral).into_response())
}

// ============================================================================
// Sessions
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// POST /api/users/login
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Response> {
    body.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let users = state.users();
    let email = normalize_email(&body.email);

    let Some(mut user) = users.get_by_email(&email).await? else {
        record_auth_failure("login");
        return Err(ApiError::unauthorized("Invalid email or password"));
    };

    let valid = verify_password(&body.password, &user.password_hash)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    if !valid {
        record_auth_failure("login");
        return Err(ApiError::unauthorized("Invalid email or password"));
    }

    if !user.email_verified {
        return Err(ApiError::forbidden("Please verify your email to continue"));
    }

    let access_token = state.tokens.sign_access_token(&user.id)?;
    let refresh_token = state.tokens.sign_refresh_token(&user.id)?;
    user.refresh_token_hash = Some(hash_token(&refresh_token));
    user.updated_at = Utc::now();
    users.update(&user).await?;

    Ok(session_response(
        &state,
        &refresh_token,
        ApiResponse::ok_with(json!({ "accessToken": access_token }), "Logged in successfully"),
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenBody {
    pub refresh_token: Option<String>,
}

/// Refresh token from cookie, header, or body, in that order.
fn incoming_refresh_token(
    jar: &CookieJar,
    headers: &HeaderMap,
    body: &RefreshTokenBody,
) -> Option<(String, bool)> {
    if let Some(cookie) = jar.get(REFRESH_COOKIE_NAME) {
        let value = cookie.value().to_string();
        if !value.is_empty() {
            return Some((value, true));
        }
    }
    if let Some(header) = headers.get(REFRESH_TOKEN_HEADER).and_then(|v| v.to_str().ok()) {
        if !header.is_empty() {
            return Some((header.to_string(), false));
        }
    }
    body.refresh_token
        .clone()
        .filter(|t| !t.is_empty())
        .map(|t| (t, false))
}

/// POST /api/users/session/refresh
///
/// Rotates both tokens. A stored-hash mismatch revokes the session: a
/// mismatched-but-valid token means the token was already rotated away,
/// possibly by a thief.
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    body: Option<Json<RefreshTokenBody>>,
) -> ApiResult<Response> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let Some((incoming, from_cookie)) = incoming_refresh_token(&jar, &headers, &body) else {
        return Err(ApiError::unauthorized("No refresh token provided"));
    };

    let claims = match state.tokens.verify_refresh_token(&incoming) {
        Ok(claims) => claims,
        Err(e) => {
            record_auth_failure("refresh");
            return Ok(with_cleared_cookie(&state, e.into_response()));
        }
    };

    let users = state.users();
    let user_id = UserId::from_string(claims.sub);
    let user = users.get(&user_id).await?;

    let Some(mut user) = user else {
        return Ok(with_cleared_cookie(
            &state,
            ApiError::unauthorized("Invalid session").into_response(),
        ));
    };
    let Some(stored_hash) = user.refresh_token_hash.clone() else {
        return Ok(with_cleared_cookie(
            &state,
            ApiError::unauthorized("Invalid session").into_response(),
        ));
    };

    if hash_token(&incoming) != stored_hash {
        warn!("Refresh token mismatch for {}, revoking session", user.id);
        record_auth_failure("refresh");
        users.set_refresh_token_hash(&user.id, None).await?;
        return Ok(with_cleared_cookie(
            &state,
            ApiError::unauthorized("Refresh token mismatch").into_response(),
        ));
    }

    let new_refresh = state.tokens.sign_refresh_token(&user.id)?;
    user.refresh_token_hash = Some(hash_token(&new_refresh));
    user.updated_at = Utc::now();
    users.update(&user).await?;

    let access_token = state.tokens.sign_access_token(&user.id)?;

    if from_cookie {
        Ok(session_response(
            &state,
            &new_refresh,
            ApiResponse::ok_with(json!({ "accessToken": access_token }), "Access token refreshed"),
        ))
    } else {
        Ok(ApiResponse::ok_with(
            json!({ "accessToken": access_token, "refreshToken": new_refresh }),
            "Tokens rotated",
        )
        .into_response())
    }
}

/// POST /api/users/session/logout
///
/// Best-effort: clears the stored refresh hash when the requester can be
/// identified by access token or refresh token, and always clears the
/// cookie.
pub async fn logout(
    State(state): State<AppState>,
    OptionalAuthUser(auth): OptionalAuthUser,
    jar: CookieJar,
    headers: HeaderMap,
    body: Option<Json<RefreshTokenBody>>,
) -> ApiResult<Response> {
    let users = state.users();

    if let Some(auth) = auth {
        users.set_refresh_token_hash(&auth.id, None).await?;
        return Ok(with_cleared_cookie(
            &state,
            ApiResponse::message(StatusCode::OK, "Logged out successfully").into_response(),
        ));
    }

    let body = body.map(|Json(b)| b).unwrap_or_default();
    let Some((incoming, _)) = incoming_refresh_token(&jar, &headers, &body) else {
        return Err(ApiError::bad_request("No active session found"));
    };

    if let Ok(claims) = state.tokens.verify_refresh_token(&incoming) {
        let _ = users
            .set_refresh_token_hash(&UserId::from_string(claims.sub), None)
            .await;
    }

    Ok(with_cleared_cookie(
        &state,
        ApiResponse::message(StatusCode::OK, "Logged out successfully").into_response(),
    ))
}

// ============================================================================
// Password management
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    #[validate(email)]
    pub email: String,
}

/// POST /api/users/forgot-password
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordRequest>,
) -> ApiResult<Response> {
    body.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let users = state.users();
    let email = normalize_email(&body.email);
    let neutral = "If an account exists, an OTP will be sent";

    let Some(mut user) = users.get_by_email(&email).await? else {
        return Ok(ApiResponse::message(StatusCode::OK, neutral).into_response());
    };

    let cooldown = Duration::minutes(state.config.resend_reset_min as i64);
    if let Some(last) = user.last_password_reset_sent_at {
        if Utc::now() - last < cooldown {
            return Err(ApiError::RateLimited);
        }
    }

    let otp = generate_otp();
    let expires_min = state.config.reset_otp_expires_min;
    user.password_reset_otp_hash = Some(hash_token(&otp));
    user.password_reset_otp_expires = Some(Utc::now() + Duration::minutes(expires_min as i64));
    user.last_password_reset_sent_at = Some(Utc::now());
    user.updated_at = Utc::now();

    users.update(&user).await?;

    state
        .mailer
        .send_password_reset_otp(&email, &otp, expires_min)
        .await?;

    Ok(ApiResponse::message(StatusCode::OK, neutral).into_response())
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(equal = 6, message = "otp must be 6 digits"))]
    pub otp: String,
    #[validate(length(min = 8, max = 128, message = "password must be 8-128 characters"))]
    pub new_password: String,
}

/// POST /api/users/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordRequest>,
) -> ApiResult<Response> {
    body.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let users = state.users();
    let email = normalize_email(&body.email);

    let mut user = users
        .get_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::bad_request("Invalid OTP or email"))?;

    let Some(stored_hash) = user.password_reset_otp_hash.clone() else {
        return Err(ApiError::bad_request("No active password reset request"));
    };
    if user
        .password_reset_otp_expires
        .map(|exp| exp < Utc::now())
        .unwrap_or(true)
    {
        return Err(ApiError::bad_request("OTP expired. Request a new one."));
    }
    if hash_token(&body.otp) != stored_hash {
        record_auth_failure("reset_otp");
        return Err(ApiError::bad_request("Invalid OTP"));
    }

    user.password_hash =
        hash_password(&body.new_password).map_err(|e| ApiError::internal(e.to_string()))?;
    user.clear_reset_otp();
    // All sessions are revoked on reset
    user.refresh_token_hash = None;
    user.updated_at = Utc::now();

    users.update(&user).await?;

    Ok(ApiResponse::message(StatusCode::OK, "Password reset successful").into_response())
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "old password is required"))]
    pub old_password: String,
    #[validate(length(min = 8, max = 128, message = "password must be 8-128 characters"))]
    pub new_password: String,
}

/// POST /api/users/change-password
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<ChangePasswordRequest>,
) -> ApiResult<Response> {
    body.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let users = state.users();
    let mut user = users
        .get(&auth.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let valid = verify_password(&body.old_password, &user.password_hash)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    if !valid {
        record_auth_failure("change_password");
        return Err(ApiError::unauthorized("Incorrect old password"));
    }

    user.password_hash =
        hash_password(&body.new_password).map_err(|e| ApiError::internal(e.to_string()))?;
    // Rotate sessions
    user.refresh_token_hash = None;
    user.updated_at = Utc::now();

    users.update(&user).await?;

    Ok(ApiResponse::message(StatusCode::OK, "Password changed successfully").into_response())
}

// ============================================================================
// Profiles
// ============================================================================

/// GET /api/users/me
pub async fn get_profile(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Response> {
    let user = state
        .users()
        .get(&auth.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(ApiResponse::ok(json!({ "user": PrivateUserView::from(&user) })).into_response())
}

/// GET /api/users/:id
///
/// Self lookups get the private view; anyone else gets the public one.
pub async fn get_profile_by_id(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    if !is_valid_id(&id) {
        return Err(ApiError::bad_request("Invalid user id"));
    }

    let user = state
        .users()
        .get(&UserId::from_string(id))
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if user.id == auth.id {
        Ok(ApiResponse::ok(json!({ "user": PrivateUserView::from(&user) })).into_response())
    } else {
        Ok(ApiResponse::ok(json!({ "user": PublicUserView::from(&user) })).into_response())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub skills: Option<StringOrList>,
    pub location: Option<LocationPatch>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationPatch {
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

/// PATCH /api/users/me
///
/// JSON or multipart. Multipart may carry `avatar` (jpeg/png/webp) and
/// `resume` (pdf) file parts; replaced objects are deleted best-effort.
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    request: Request,
) -> ApiResult<Response> {
    let parsed = json_or_multipart::<UpdateProfileRequest>(&state, request).await?;
    let body = parsed.body;

    let users = state.users();
    let mut user = users
        .get(&auth.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if let Some(name) = body.name {
        let name = sanitize_text(name.trim());
        if !name.is_empty() {
            user.name = name;
        }
    }
    if let Some(bio) = body.bio {
        user.bio = non_empty(Some(bio));
    }
    if let Some(skills) = body.skills {
        let skills = skills.into_vec();
        if !skills.is_empty() {
            user.skills = skills;
        }
    }
    if let Some(location) = body.location {
        if let Some(city) = location.city {
            user.location.city = non_empty(Some(city));
        }
        if let Some(state_field) = location.state {
            user.location.state = non_empty(Some(state_field));
        }
        if let Some(country) = location.country {
            user.location.country = non_empty(Some(country));
        }
    }

    if let Some(avatar) = parsed.files.get("avatar") {
        let stored = state
            .storage
            .upload(
                MediaKind::Avatar,
                auth.id.as_str(),
                avatar.data.clone(),
                &avatar.content_type,
            )
            .await
            .map_err(|e| match e {
                jhive_storage::StorageError::UnsupportedContentType(_) => {
                    ApiError::bad_request("Invalid avatar file type.")
                }
                other => ApiError::from(other),
            })?;

        if let Some(old_key) = user.avatar_key.take() {
            state.storage.delete_best_effort(&old_key).await;
        }
        user.avatar_url = Some(stored.url);
        user.avatar_key = Some(stored.key);
    }

    if let Some(resume) = parsed.files.get("resume") {
        let stored = state
            .storage
            .upload(
                MediaKind::Resume,
                auth.id.as_str(),
                resume.data.clone(),
                &resume.content_type,
            )
            .await
            .map_err(|e| match e {
                jhive_storage::StorageError::UnsupportedContentType(_) => {
                    ApiError::bad_request("Invalid resume file type; only PDF allowed")
                }
                other => ApiError::from(other),
            })?;

        if let Some(old_key) = user.resume_key.take() {
            state.storage.delete_best_effort(&old_key).await;
        }
        user.resume_url = Some(stored.url);
        user.resume_key = Some(stored.key);
    }

    user.updated_at = Utc::now();
    users.update(&user).await?;

    Ok(ApiResponse::ok_with(
        json!({ "user": PrivateUserView::from(&user) }),
        "Profile updated successfully",
    )
    .into_response())
}

// ============================================================================
// Admin listing
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ListUsersParams {
    pub q: Option<String>,
    pub role: Option<String>,
    pub company: Option<String>,
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct UserListData {
    pub meta: PageMeta,
    pub users: Vec<AdminUserRow>,
}

/// GET /api/users (admin only)
pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<ListUsersParams>,
) -> ApiResult<Response> {
    require_role(&auth, &[UserRole::Admin])?;

    let role = match params.role.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            UserRole::parse(raw)
                .ok_or_else(|| ApiError::bad_request("Invalid role filter"))?,
        ),
    };

    if let Some(company) = params.company.as_deref() {
        if !is_valid_id(company) {
            return Err(ApiError::bad_request("Invalid company id"));
        }
    }

    let query = UserListQuery {
        q: params.q.as_deref().and_then(sanitize_search_term),
        role,
        company: params.company,
        sort: params.sort,
        page: params.page,
        limit: params.limit,
    };

    let (users, meta) = state.users().list(&query).await?;

    let rows: Vec<AdminUserRow> = users
        .iter()
        .map(|u| AdminUserRow {
            id: u.id.as_str().to_string(),
            name: u.name.clone(),
            email: u.email.clone(),
            role: u.role,
            company: u.company.as_ref().map(|c| c.as_str().to_string()),
            created_at: u.created_at,
        })
        .collect();

    Ok(ApiResponse::ok(UserListData { meta, users: rows }).into_response())
}

// ============================================================================
// Helpers
// ============================================================================

/// Attach a fresh refresh cookie to a response.
fn session_response<T: Serialize>(
    state: &AppState,
    refresh_token: &str,
    response: ApiResponse<T>,
) -> Response {
    let cookie = refresh_cookie(
        refresh_token,
        state.tokens.refresh_ttl_secs(),
        state.config.is_production(),
    );
    (AppendHeaders([(SET_COOKIE, cookie)]), response).into_response()
}

/// Attach a cookie-clearing header to a response.
fn with_cleared_cookie(state: &AppState, response: Response) -> Response {
    let cookie = clear_refresh_cookie(state.config.is_production());
    (AppendHeaders([(SET_COOKIE, cookie)]), response).into_response()
}
