//! Axum HTTP API server.
//!
//! This crate provides:
//! - REST endpoints for users, companies, jobs and applications
//! - JWT access/refresh authentication with rotation
//! - Role and ownership authorization per route
//! - Rate limiting, security headers and Prometheus metrics

pub mod auth;
pub mod authz;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod password;
pub mod response;
pub mod routes;
pub mod sanitize;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use response::ApiResponse;
pub use routes::create_router;
pub use state::AppState;
