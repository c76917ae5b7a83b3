//! Mail provider HTTP client.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{MailError, MailResult};

/// Configuration for the mailer.
#[derive(Debug, Clone)]
pub struct MailerConfig {
    /// Base URL of the mail provider API
    pub base_url: String,
    /// API key (bearer)
    pub api_key: String,
    /// From address
    pub from_email: String,
    /// From display name
    pub from_name: String,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries on transient failures
    pub max_retries: u32,
    /// When false, sends are logged and dropped (tests, local dev)
    pub enabled: bool,
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.mailprovider.example".to_string(),
            api_key: String::new(),
            from_email: "no-reply@jobhive.example".to_string(),
            from_name: "JobHive".to_string(),
            timeout: Duration::from_secs(10),
            max_retries: 2,
            enabled: false,
        }
    }
}

impl MailerConfig {
    /// Create config from environment variables.
    ///
    /// The mailer is enabled only when both MAILER_API_URL and
    /// MAILER_API_KEY are present.
    pub fn from_env() -> Self {
        let base_url = std::env::var("MAILER_API_URL").ok();
        let api_key = std::env::var("MAILER_API_KEY").ok();
        let enabled = base_url.is_some() && api_key.is_some();

        Self {
            base_url: base_url.unwrap_or_else(|| "https://api.mailprovider.example".to_string()),
            api_key: api_key.unwrap_or_default(),
            from_email: std::env::var("MAIL_FROM_EMAIL")
                .unwrap_or_else(|_| "no-reply@jobhive.example".to_string()),
            from_name: std::env::var("MAIL_FROM_NAME").unwrap_or_else(|_| "JobHive".to_string()),
            timeout: Duration::from_secs(
                std::env::var("MAILER_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            max_retries: std::env::var("MAILER_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            enabled,
        }
    }
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    from: String,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

/// Transactional email client.
pub struct Mailer {
    http: Client,
    config: MailerConfig,
}

impl Mailer {
    /// Create a new mailer.
    pub fn new(config: MailerConfig) -> MailResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(MailError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> MailResult<Self> {
        Self::new(MailerConfig::from_env())
    }

    /// Whether real sends are configured.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Send the email-verification OTP.
    pub async fn send_verification_otp(
        &self,
        to: &str,
        otp: &str,
        valid_minutes: u64,
    ) -> MailResult<()> {
        let html = format!(
            "<p>Your verification code is <b>{}</b>. It is valid for {} minutes.</p>",
            otp, valid_minutes
        );
        let text = format!(
            "Your verification code is {}. It is valid for {} minutes.",
            otp, valid_minutes
        );
        self.send(to, "Your verification code", &html, &text).await
    }

    /// Send the password-reset OTP.
    pub async fn send_password_reset_otp(
        &self,
        to: &str,
        otp: &str,
        valid_minutes: u64,
    ) -> MailResult<()> {
        let html = format!(
            "<p>Your password reset code is <b>{}</b>. It is valid for {} minutes.</p>",
            otp, valid_minutes
        );
        let text = format!(
            "Your password reset code is {}. It is valid for {} minutes.",
            otp, valid_minutes
        );
        self.send(to, "Password reset code", &html, &text).await
    }

    /// Send one message through the provider.
    pub async fn send(&self, to: &str, subject: &str, html: &str, text: &str) -> MailResult<()> {
        if !self.config.enabled {
            info!(to = %to, subject = %subject, "Mailer disabled, dropping message");
            return Ok(());
        }

        let url = format!("{}/send", self.config.base_url.trim_end_matches('/'));
        let request = SendRequest {
            from: format!("{} <{}>", self.config.from_name, self.config.from_email),
            to,
            subject,
            html,
            text,
        };

        let response = self
            .with_retry(|| async {
                let response = self
                    .http
                    .post(&url)
                    .bearer_auth(&self.config.api_key)
                    .json(&request)
                    .send()
                    .await
                    .map_err(MailError::Network)?;

                if response.status().is_server_error() {
                    return Err(MailError::ServiceUnavailable(format!(
                        "provider returned {}",
                        response.status()
                    )));
                }

                Ok(response)
            })
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::RequestFailed(format!(
                "mail provider returned {}: {}",
                status, body
            )));
        }

        debug!(to = %to, subject = %subject, "Sent email");
        Ok(())
    }

    /// Execute with retry on transient failures.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> MailResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = MailResult<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                    warn!(
                        "Mail send failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(MailError::RequestFailed("Unknown error".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: String) -> MailerConfig {
        MailerConfig {
            base_url,
            api_key: "test-key".to_string(),
            from_email: "no-reply@jobhive.example".to_string(),
            from_name: "JobHive".to_string(),
            timeout: Duration::from_secs(2),
            max_retries: 1,
            enabled: true,
        }
    }

    #[tokio::test]
    async fn sends_through_provider() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/send"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mailer = Mailer::new(test_config(server.uri())).unwrap();
        mailer
            .send_verification_otp("jane@example.com", "123456", 10)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn provider_client_error_is_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/send"))
            .respond_with(ResponseTemplate::new(422))
            .expect(1)
            .mount(&server)
            .await;

        let mailer = Mailer::new(test_config(server.uri())).unwrap();
        let err = mailer
            .send("jane@example.com", "subject", "<p>hi</p>", "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::RequestFailed(_)));
    }

    #[tokio::test]
    async fn disabled_mailer_drops_messages() {
        let mut config = test_config("http://127.0.0.1:1".to_string());
        config.enabled = false;

        let mailer = Mailer::new(config).unwrap();
        // Never touches the (unroutable) endpoint
        mailer
            .send_password_reset_otp("jane@example.com", "654321", 10)
            .await
            .unwrap();
    }
}
