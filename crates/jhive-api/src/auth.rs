//! JWT access/refresh tokens, OTP generation and request authentication.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use jhive_models::{UserId, UserRole};

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::state::AppState;

/// Refresh-token cookie, scoped to the session endpoints only.
pub const REFRESH_COOKIE_NAME: &str = "refreshToken";
pub const REFRESH_COOKIE_PATH: &str = "/api/users/session";

/// Header fallback for non-browser clients.
pub const REFRESH_TOKEN_HEADER: &str = "x-refresh-token";

/// JWT claims for both token kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    /// Issuer
    pub iss: String,
    /// Issued at
    pub iat: i64,
    /// Expiration
    pub exp: i64,
}

/// Signs and verifies access/refresh tokens.
#[derive(Clone)]
pub struct TokenService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    issuer: String,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl TokenService {
    /// Build from configuration.
    pub fn new(config: &ApiConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(config.access_token_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.access_token_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.refresh_token_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.refresh_token_secret.as_bytes()),
            issuer: config.token_issuer.clone(),
            access_ttl_secs: config.access_token_ttl.as_secs() as i64,
            refresh_ttl_secs: config.refresh_token_ttl.as_secs() as i64,
        }
    }

    fn claims(&self, user_id: &UserId, ttl_secs: i64) -> Claims {
        let now = chrono::Utc::now().timestamp();
        Claims {
            sub: user_id.as_str().to_string(),
            iss: self.issuer.clone(),
            iat: now,
            exp: now + ttl_secs,
        }
    }

    /// Sign a short-lived access token.
    pub fn sign_access_token(&self, user_id: &UserId) -> Result<String, ApiError> {
        encode(
            &Header::new(Algorithm::HS256),
            &self.claims(user_id, self.access_ttl_secs),
            &self.access_encoding,
        )
        .map_err(|e| ApiError::internal(format!("Failed to sign access token: {}", e)))
    }

    /// Sign a refresh token.
    pub fn sign_refresh_token(&self, user_id: &UserId) -> Result<String, ApiError> {
        encode(
            &Header::new(Algorithm::HS256),
            &self.claims(user_id, self.refresh_ttl_secs),
            &self.refresh_encoding,
        )
        .map_err(|e| ApiError::internal(format!("Failed to sign refresh token: {}", e)))
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation
    }

    /// Verify an access token.
    pub fn verify_access_token(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.access_decoding, &self.validation())
            .map(|data| data.claims)
            .map_err(|_| ApiError::unauthorized("Invalid or expired access token"))
    }

    /// Verify a refresh token.
    pub fn verify_refresh_token(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.refresh_decoding, &self.validation())
            .map(|data| data.claims)
            .map_err(|_| ApiError::unauthorized("Invalid or expired refresh token"))
    }

    /// Refresh cookie TTL in seconds.
    pub fn refresh_ttl_secs(&self) -> i64 {
        self.refresh_ttl_secs
    }
}

/// Generate a 6-digit numeric OTP.
pub fn generate_otp() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{:06}", n)
}

/// SHA-256 hex digest of a token or OTP. Stored instead of the raw value.
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Set-Cookie value installing the refresh token.
pub fn refresh_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    format!(
        "{}={}; Max-Age={}; Path={}; HttpOnly; SameSite=Lax{}",
        REFRESH_COOKIE_NAME,
        token,
        max_age_secs,
        REFRESH_COOKIE_PATH,
        if secure { "; Secure" } else { "" }
    )
}

/// Set-Cookie value clearing the refresh token.
pub fn clear_refresh_cookie(secure: bool) -> String {
    refresh_cookie("", 0, secure)
}

/// Authenticated requester, resolved against the user collection so role
/// and verification state are current.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: UserId,
    pub role: UserRole,
    pub email: String,
    pub email_verified: bool,
}

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let header = parts
        .headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

    header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::unauthorized("Invalid Authorization header format"))
}

async fn resolve_user(state: &AppState, token: &str) -> Result<AuthUser, ApiError> {
    let claims = state.tokens.verify_access_token(token)?;

    let user = state
        .users()
        .get(&UserId::from_string(claims.sub))
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;

    Ok(AuthUser {
        id: user.id,
        role: user.role,
        email: user.email,
        email_verified: user.email_verified,
    })
}

/// Axum extractor for required authentication.
#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        resolve_user(state, token).await
    }
}

/// Axum extractor for optional authentication (e.g. logout).
#[derive(Debug, Clone)]
pub struct OptionalAuthUser(pub Option<AuthUser>);

#[axum::async_trait]
impl FromRequestParts<AppState> for OptionalAuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match bearer_token(parts) {
            Ok(token) => Ok(Self(resolve_user(state, token).await.ok())),
            Err(_) => Ok(Self(None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_service() -> TokenService {
        let config = ApiConfig {
            access_token_secret: "access-secret-for-tests".to_string(),
            refresh_token_secret: "refresh-secret-for-tests".to_string(),
            token_issuer: "jobhive-test".to_string(),
            access_token_ttl: Duration::from_secs(900),
            refresh_token_ttl: Duration::from_secs(7 * 24 * 3600),
            ..ApiConfig::default()
        };
        TokenService::new(&config)
    }

    #[test]
    fn access_token_round_trip() {
        let service = test_service();
        let user_id = UserId::from_string("user-1");

        let token = service.sign_access_token(&user_id).unwrap();
        let claims = service.verify_access_token(&token).unwrap();

        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.iss, "jobhive-test");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn token_kinds_are_not_interchangeable() {
        let service = test_service();
        let user_id = UserId::from_string("user-1");

        let access = service.sign_access_token(&user_id).unwrap();
        let refresh = service.sign_refresh_token(&user_id).unwrap();

        assert!(service.verify_refresh_token(&access).is_err());
        assert!(service.verify_access_token(&refresh).is_err());
    }

    #[test]
    fn otp_is_six_digits() {
        for _ in 0..50 {
            let otp = generate_otp();
            assert_eq!(otp.len(), 6);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn token_hash_is_stable_hex() {
        let a = hash_token("123456");
        let b = hash_token("123456");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, hash_token("123457"));
    }

    #[test]
    fn cookie_attributes() {
        let cookie = refresh_cookie("tok", 3600, true);
        assert!(cookie.contains("refreshToken=tok"));
        assert!(cookie.contains("Path=/api/users/session"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));

        let cleared = clear_refresh_cookie(false);
        assert!(cleared.contains("Max-Age=0"));
        assert!(!cleared.contains("Secure"));
    }
}
