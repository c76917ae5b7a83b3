//! API routes.

use axum::middleware;
use axum::routing::{delete, get, patch, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::applications::{
    apply_to_job, delete_my_application, get_application, get_job_application_stats,
    get_my_application_stats, list_job_applications, list_my_applications,
    mark_application_viewed, update_application_status,
};
use crate::handlers::companies::{
    create_company, delete_company, get_company, list_companies, unverify_company, update_company,
    verify_company,
};
use crate::handlers::health::{health, ready};
use crate::handlers::jobs::{
    create_job, delete_job, get_job, list_jobs, list_my_jobs, update_job, update_job_status,
};
use crate::handlers::users::{
    change_password, forgot_password, get_profile, get_profile_by_id, list_users, login, logout,
    refresh, register, resend_verification, reset_password, update_profile, verify_email_otp,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, security_headers,
    ClientRateLimits,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    // Credential endpoints get a tighter per-minute limiter
    let auth_rate_limiter = std::sync::Arc::new(ClientRateLimits::per_minute(10));

    let credential_routes = Router::new()
        .route("/login", post(login))
        .route("/resend-verification", post(resend_verification))
        .route("/forgot-password", post(forgot_password))
        .layer(middleware::from_fn_with_state(
            auth_rate_limiter,
            rate_limit_middleware,
        ));

    let user_routes = Router::new()
        .route("/register", post(register))
        .route("/verify-email-otp", post(verify_email_otp))
        .route("/reset-password", post(reset_password))
        .route("/change-password", post(change_password))
        .route("/session/refresh", post(refresh))
        .route("/session/logout", post(logout))
        .route("/me", get(get_profile))
        .route("/me", patch(update_profile))
        .route("/", get(list_users))
        .route("/:id", get(get_profile_by_id))
        .merge(credential_routes);

    let company_routes = Router::new()
        .route("/", post(create_company))
        .route("/", get(list_companies))
        .route("/:id", get(get_company))
        .route("/:id", patch(update_company))
        .route("/:id", delete(delete_company))
        .route("/:id/verify", post(verify_company))
        .route("/:id/unverify", post(unverify_company));

    let job_routes = Router::new()
        .route("/", post(create_job))
        .route("/", get(list_jobs))
        .route("/my", get(list_my_jobs))
        .route("/:id", get(get_job))
        .route("/:id", patch(update_job))
        .route("/:id/status", patch(update_job_status))
        .route("/:id", delete(delete_job));

    let application_routes = Router::new()
        .route("/:id/apply", post(apply_to_job))
        .route("/my", get(list_my_applications))
        .route("/my/stats", get(get_my_application_stats))
        .route("/job/:jobId", get(list_job_applications))
        .route("/job/:jobId/stats", get(get_job_application_stats))
        .route("/:id", get(get_application))
        .route("/:id/status", patch(update_application_status))
        .route("/:id/viewed", patch(mark_application_viewed))
        .route("/:id", delete(delete_my_application));

    let rate_limiter = std::sync::Arc::new(ClientRateLimits::per_second(state.config.rate_limit_rps));

    let api_routes = Router::new()
        .nest("/users", user_routes)
        .nest("/companies", company_routes)
        .nest("/jobs", job_routes)
        .nest("/applications", application_routes)
        .route("/health", get(health))
        .route("/ready", get(ready))
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(metrics_routes)
        // Request body size limit to keep multipart uploads bounded
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
