//! API configuration.

use std::time::Duration;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Rate limit requests per second
    pub rate_limit_rps: u32,
    /// Max request body size
    pub max_body_size: usize,
    /// Hard cap on `limit` for list endpoints
    pub max_page_limit: u32,
    /// Environment (development/production)
    pub environment: String,

    /// HS256 secret for access tokens
    pub access_token_secret: String,
    /// HS256 secret for refresh tokens
    pub refresh_token_secret: String,
    /// JWT issuer
    pub token_issuer: String,
    /// Access token lifetime
    pub access_token_ttl: Duration,
    /// Refresh token lifetime
    pub refresh_token_ttl: Duration,

    /// Email-verification OTP lifetime in minutes
    pub verify_otp_expires_min: u64,
    /// Password-reset OTP lifetime in minutes
    pub reset_otp_expires_min: u64,
    /// Cooldown between verification resends, in minutes
    pub resend_verify_min: u64,
    /// Cooldown between reset requests, in minutes
    pub resend_reset_min: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            max_body_size: 10 * 1024 * 1024, // 10MB
            max_page_limit: 100,
            environment: "development".to_string(),
            access_token_secret: String::new(),
            refresh_token_secret: String::new(),
            token_issuer: "jobhive".to_string(),
            access_token_ttl: Duration::from_secs(15 * 60),
            refresh_token_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            verify_otp_expires_min: 10,
            reset_otp_expires_min: 10,
            resend_verify_min: 5,
            resend_reset_min: 5,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    ///
    /// ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET are mandatory; the
    /// server refuses to start without them.
    pub fn from_env() -> Result<Self, String> {
        let access_token_secret = std::env::var("ACCESS_TOKEN_SECRET")
            .map_err(|_| "ACCESS_TOKEN_SECRET must be set".to_string())?;
        let refresh_token_secret = std::env::var("REFRESH_TOKEN_SECRET")
            .map_err(|_| "REFRESH_TOKEN_SECRET must be set".to_string())?;

        if access_token_secret.is_empty() || refresh_token_secret.is_empty() {
            return Err("Token secrets cannot be empty".to_string());
        }

        Ok(Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8000),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|_| vec!["*".to_string()]),
            rate_limit_rps: std::env::var("RATE_LIMIT_RPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10 * 1024 * 1024),
            max_page_limit: std::env::var("MAX_PAGE_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100),
            environment: std::env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            access_token_secret,
            refresh_token_secret,
            token_issuer: std::env::var("TOKEN_ISSUER").unwrap_or_else(|_| "jobhive".to_string()),
            access_token_ttl: Duration::from_secs(
                std::env::var("ACCESS_TOKEN_TTL_MIN")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(15)
                    * 60,
            ),
            refresh_token_ttl: Duration::from_secs(
                std::env::var("REFRESH_TOKEN_TTL_DAYS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(7)
                    * 24
                    * 60
                    * 60,
            ),
            verify_otp_expires_min: std::env::var("VERIFY_OTP_EXPIRES_MIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            reset_otp_expires_min: std::env::var("RESET_OTP_EXPIRES_MIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            resend_verify_min: std::env::var("RESEND_VERIFY_MINUTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            resend_reset_min: std::env::var("RESEND_RESET_MINUTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        })
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}
