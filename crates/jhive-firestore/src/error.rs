//! Firestore error types.

use thiserror::Error;

/// Result type for Firestore operations.
pub type FirestoreResult<T> = Result<T, FirestoreError>;

/// Errors that can occur during Firestore operations.
#[derive(Debug, Error)]
pub enum FirestoreError {
    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Document already exists: {0}")]
    AlreadyExists(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Rate limited, retry after {0}ms")]
    RateLimited(u64),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FirestoreError {
    pub fn auth_error(msg: impl Into<String>) -> Self {
        Self::AuthError(msg.into())
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Map an HTTP status into the matching error variant.
    pub fn from_http_status(status: u16, detail: String) -> Self {
        match status {
            403 => Self::PermissionDenied(detail),
            404 => Self::NotFound(detail),
            409 => Self::AlreadyExists(detail),
            429 => Self::RateLimited(1000),
            _ => Self::RequestFailed(detail),
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            FirestoreError::Network(_) | FirestoreError::RateLimited(_) => true,
            FirestoreError::RequestFailed(msg) => {
                msg.contains("UNAVAILABLE") || msg.contains("503") || msg.contains("500")
            }
            _ => false,
        }
    }

    /// Suggested delay from a 429, when known.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            FirestoreError::RateLimited(ms) => Some(*ms),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        assert!(matches!(
            FirestoreError::from_http_status(404, String::new()),
            FirestoreError::NotFound(_)
        ));
        assert!(matches!(
            FirestoreError::from_http_status(409, String::new()),
            FirestoreError::AlreadyExists(_)
        ));
        assert!(matches!(
            FirestoreError::from_http_status(429, String::new()),
            FirestoreError::RateLimited(_)
        ));
        assert!(matches!(
            FirestoreError::from_http_status(500, String::new()),
            FirestoreError::RequestFailed(_)
        ));
    }

    #[test]
    fn retryable_classification() {
        assert!(FirestoreError::RateLimited(100).is_retryable());
        assert!(!FirestoreError::NotFound("x".into()).is_retryable());
        assert!(!FirestoreError::AlreadyExists("x".into()).is_retryable());
    }
}
