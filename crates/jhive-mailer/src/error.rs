//! Mailer error types.

use thiserror::Error;

pub type MailResult<T> = Result<T, MailError>;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Mail provider unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MailError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MailError::ServiceUnavailable(_) | MailError::Network(_)
        )
    }
}
