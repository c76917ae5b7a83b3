//! Cached service-account tokens for Firestore calls.
//!
//! Tokens are reused until shortly before expiry; a single writer refreshes
//! while readers keep the fast path, and a failed refresh falls back to the
//! previous token if it is still within its lifetime.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use gcp_auth::TokenProvider;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{FirestoreError, FirestoreResult};

/// OAuth scope granting Firestore REST access.
pub const FIRESTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

/// A token is considered due for refresh this long before it expires, so
/// in-flight requests never race the expiry.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

struct Lease {
    token: String,
    expires_at: Instant,
}

impl Lease {
    fn due_for_refresh(&self) -> bool {
        Instant::now() + REFRESH_MARGIN >= self.expires_at
    }

    fn still_usable(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Shared token cache. Cheap to clone behind an Arc; all Firestore requests
/// in the process go through one instance.
pub struct TokenCache {
    provider: Arc<dyn TokenProvider>,
    lease: RwLock<Option<Lease>>,
}

impl TokenCache {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            provider,
            lease: RwLock::new(None),
        }
    }

    /// Drop the cached token so the next call fetches a fresh one. Used
    /// when the server rejects a token the cache thought was valid.
    pub async fn invalidate(&self) {
        self.lease.write().await.take();
    }

    /// Current access token, refreshed when due.
    pub async fn get_token(&self) -> FirestoreResult<String> {
        if let Some(lease) = self.lease.read().await.as_ref() {
            if !lease.due_for_refresh() {
                return Ok(lease.token.clone());
            }
        }

        let mut slot = self.lease.write().await;
        // A concurrent caller may have refreshed while we waited for the lock
        if let Some(lease) = slot.as_ref() {
            if !lease.due_for_refresh() {
                return Ok(lease.token.clone());
            }
        }

        match self.fetch_lease().await {
            Ok(lease) => {
                let token = lease.token.clone();
                *slot = Some(lease);
                debug!("Refreshed Firestore auth token");
                Ok(token)
            }
            Err(e) => {
                // Ride out provider hiccups on the old token if it has life left
                if let Some(lease) = slot.as_ref() {
                    if lease.still_usable() {
                        warn!("Token refresh failed, using existing token: {}", e);
                        return Ok(lease.token.clone());
                    }
                }
                Err(e)
            }
        }
    }

    async fn fetch_lease(&self) -> FirestoreResult<Lease> {
        let token = self
            .provider
            .token(&[FIRESTORE_SCOPE])
            .await
            .map_err(|e| FirestoreError::auth_error(format!("Failed to obtain auth token: {}", e)))?;

        // A non-positive remaining lifetime leaves the lease already due,
        // forcing another refresh on the next call
        let remaining = (token.expires_at() - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);

        Ok(Lease {
            token: token.as_str().to_string(),
            expires_at: Instant::now() + remaining,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lease_refresh_window() {
        let fresh = Lease {
            token: "t".to_string(),
            expires_at: Instant::now() + Duration::from_secs(600),
        };
        assert!(!fresh.due_for_refresh());
        assert!(fresh.still_usable());

        let expiring = Lease {
            token: "t".to_string(),
            expires_at: Instant::now() + Duration::from_secs(30),
        };
        // Within the margin: refresh is due but the token still works
        assert!(expiring.due_for_refresh());
        assert!(expiring.still_usable());
    }
}
