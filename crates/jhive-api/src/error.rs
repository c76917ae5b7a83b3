//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Too many requests. Try again later.")]
    RateLimited,

    #[error("{0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Storage error: {0}")]
    Storage(#[from] jhive_storage::StorageError),

    #[error("Firestore error: {0}")]
    Firestore(jhive_firestore::FirestoreError),

    #[error("Mail error: {0}")]
    Mail(#[from] jhive_mailer::MailError),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_)
            | ApiError::Storage(_)
            | ApiError::Firestore(_)
            | ApiError::Mail(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the message may be shown to clients. Server-side failures
    /// log full detail but expose a generic message in production.
    fn exposes_message(&self) -> bool {
        !matches!(
            self,
            ApiError::Internal(_) | ApiError::Storage(_) | ApiError::Firestore(_) | ApiError::Mail(_)
        )
    }
}

/// Store errors carry their own status semantics: duplicates are conflicts,
/// missing documents are 404s, everything else is a server error.
impl From<jhive_firestore::FirestoreError> for ApiError {
    fn from(e: jhive_firestore::FirestoreError) -> Self {
        use jhive_firestore::FirestoreError as Fe;
        match e {
            Fe::AlreadyExists(_) => ApiError::Conflict("Duplicate resource".to_string()),
            Fe::NotFound(path) => ApiError::NotFound(format!("Not found: {}", path)),
            other => ApiError::Firestore(other),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorEnvelope {
    status_code: u16,
    data: Option<()>,
    message: String,
    success: bool,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if self.exposes_message() {
            self.to_string()
        } else {
            error!("Request failed: {}", self);
            if std::env::var("ENVIRONMENT").unwrap_or_default().to_lowercase() == "production" {
                "Something went wrong".to_string()
            } else {
                self.to_string()
            }
        };

        let body = ErrorEnvelope {
            status_code: status.as_u16(),
            data: None,
            message,
            success: false,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jhive_firestore::FirestoreError;

    #[test]
    fn firestore_duplicates_become_conflicts() {
        let err: ApiError = FirestoreError::AlreadyExists("applications/j--u".into()).into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn firestore_missing_becomes_not_found() {
        let err: ApiError = FirestoreError::NotFound("jobs/x".into()).into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn server_errors_do_not_expose_messages() {
        assert!(!ApiError::internal("db exploded").exposes_message());
        assert!(ApiError::bad_request("bad input").exposes_message());
        assert!(ApiError::forbidden("nope").exposes_message());
    }

    #[test]
    fn status_mapping() {
        assert_eq!(ApiError::bad_request("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::unauthorized("x").status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("x").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::conflict("x").status_code(), StatusCode::CONFLICT);
        assert_eq!(ApiError::RateLimited.status_code(), StatusCode::TOO_MANY_REQUESTS);
    }
}
