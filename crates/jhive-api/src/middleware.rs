//! Cross-cutting HTTP middleware: rate limiting, CORS, security headers,
//! request IDs and request logging.

use std::collections::HashMap;
use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::{Request, Response, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::metrics;

type IpRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Cap on tracked client addresses, so an attacker cycling source IPs
/// cannot grow the map without bound.
const MAX_TRACKED_CLIENTS: usize = 10_000;

/// How long an idle client's limiter is kept before eviction.
const CLIENT_TTL: Duration = Duration::from_secs(3600);

struct ClientEntry {
    limiter: Arc<IpRateLimiter>,
    first_seen: Instant,
}

/// Per-client-IP rate limiting state shared by a route group.
#[derive(Clone)]
pub struct ClientRateLimits {
    clients: Arc<RwLock<HashMap<IpAddr, ClientEntry>>>,
    quota: Quota,
}

impl ClientRateLimits {
    /// Limit each client to `rps` requests per second.
    pub fn per_second(rps: u32) -> Self {
        Self::with_quota(Quota::per_second(nonzero_or(rps, 10)))
    }

    /// Limit each client to `rpm` requests per minute. Used on credential
    /// endpoints where a tighter budget is appropriate.
    pub fn per_minute(rpm: u32) -> Self {
        Self::with_quota(Quota::per_minute(nonzero_or(rpm, 5)))
    }

    fn with_quota(quota: Quota) -> Self {
        Self {
            clients: Arc::new(RwLock::new(HashMap::new())),
            quota,
        }
    }

    /// Whether this request fits the client's budget.
    pub async fn allow(&self, ip: IpAddr) -> bool {
        if let Some(entry) = self.clients.read().await.get(&ip) {
            return entry.limiter.check().is_ok();
        }

        let mut clients = self.clients.write().await;
        // Re-check: the entry may have appeared while we waited for the lock
        if let Some(entry) = clients.get(&ip) {
            return entry.limiter.check().is_ok();
        }

        if clients.len() >= MAX_TRACKED_CLIENTS {
            Self::evict(&mut clients);
        }

        let limiter = Arc::new(RateLimiter::direct(self.quota));
        let allowed = limiter.check().is_ok();
        clients.insert(
            ip,
            ClientEntry {
                limiter,
                first_seen: Instant::now(),
            },
        );
        allowed
    }

    /// Drop idle entries; if that is not enough, drop the oldest. Leaves
    /// room for the caller's pending insert.
    fn evict(clients: &mut HashMap<IpAddr, ClientEntry>) {
        let now = Instant::now();
        clients.retain(|_, entry| now.duration_since(entry.first_seen) < CLIENT_TTL);

        let overflow = (clients.len() + 1).saturating_sub(MAX_TRACKED_CLIENTS);
        if overflow > 0 {
            let mut by_age: Vec<(IpAddr, Instant)> = clients
                .iter()
                .map(|(ip, entry)| (*ip, entry.first_seen))
                .collect();
            by_age.sort_by_key(|(_, seen)| *seen);
            for (ip, _) in by_age.into_iter().take(overflow) {
                clients.remove(&ip);
            }
            warn!("Rate limiter map over capacity, evicted {} clients", overflow);
        }
    }
}

fn nonzero_or(value: u32, fallback: u32) -> NonZeroU32 {
    NonZeroU32::new(value).unwrap_or(NonZeroU32::new(fallback).unwrap())
}

/// Reject requests over the client's budget with 429.
pub async fn rate_limit_middleware(
    State(limits): State<Arc<ClientRateLimits>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    if let Some(ip) = client_ip(&request) {
        if !limits.allow(ip).await {
            warn!(ip = %ip, "Rate limit exceeded");
            metrics::record_rate_limit_hit(request.uri().path());
            return (
                StatusCode::TOO_MANY_REQUESTS,
                [("Retry-After", "1")],
                "Rate limit exceeded. Please try again later.",
            )
                .into_response();
        }
    }
    next.run(request).await
}

/// Resolve the client address: X-Forwarded-For's first hop, then
/// X-Real-IP, then the socket peer.
fn client_ip(request: &Request<Body>) -> Option<IpAddr> {
    let header_ip = |name: &str| -> Option<IpAddr> {
        let value = request.headers().get(name)?.to_str().ok()?;
        value.split(',').next()?.trim().parse().ok()
    };

    header_ip("X-Forwarded-For")
        .or_else(|| header_ip("X-Real-IP"))
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<std::net::SocketAddr>>()
                .map(|ci| ci.0.ip())
        })
}

/// CORS for the configured origins. A `*` entry means any origin without
/// credentials; explicit origins get credentials and a fixed header set.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    use axum::http::{header, Method};

    if origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
            .expose_headers(Any)
            .max_age(Duration::from_secs(600));
    }

    let parsed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::ORIGIN,
        ])
        .expose_headers([
            header::CONTENT_LENGTH,
            header::CONTENT_TYPE,
            header::CONTENT_DISPOSITION,
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(600))
}

static SECURITY_HEADERS: LazyLock<[(HeaderName, &str); 5]> = LazyLock::new(|| {
    [
        (HeaderName::from_static("x-content-type-options"), "nosniff"),
        (HeaderName::from_static("x-frame-options"), "DENY"),
        (
            HeaderName::from_static("strict-transport-security"),
            "max-age=31536000; includeSubDomains",
        ),
        (
            HeaderName::from_static("referrer-policy"),
            "strict-origin-when-cross-origin",
        ),
        (
            HeaderName::from_static("cross-origin-resource-policy"),
            "same-origin",
        ),
    ]
});

/// Attach the standard security headers to every response.
pub async fn security_headers(request: Request<Body>, next: Next) -> Response<Body> {
    let mut response = next.run(request).await;
    for (name, value) in SECURITY_HEADERS.iter() {
        response
            .headers_mut()
            .insert(name.clone(), HeaderValue::from_static(*value));
    }
    response
}

/// Propagate or mint an X-Request-ID, visible to handlers via extensions
/// and echoed on the response.
pub async fn request_id(mut request: Request<Body>, next: Next) -> Response<Body> {
    let id = request
        .headers()
        .get("X-Request-ID")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(id.clone());
    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert("X-Request-ID", value);
    }
    response
}

/// One structured log line per request. Probe endpoints are skipped to
/// keep the logs readable.
pub async fn request_logging(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    if !matches!(uri.path(), "/api/health" | "/api/ready") {
        info!(
            method = %method,
            uri = %uri,
            status = %response.status(),
            duration_ms = %start.elapsed().as_millis(),
            "Request completed"
        );
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn per_second_budget_is_enforced() {
        let limits = ClientRateLimits::per_second(2);
        let ip: IpAddr = "203.0.113.9".parse().unwrap();

        assert!(limits.allow(ip).await);
        assert!(limits.allow(ip).await);
        assert!(!limits.allow(ip).await);
    }

    #[tokio::test]
    async fn clients_are_limited_independently() {
        let limits = ClientRateLimits::per_minute(1);
        let a: IpAddr = "203.0.113.1".parse().unwrap();
        let b: IpAddr = "203.0.113.2".parse().unwrap();

        assert!(limits.allow(a).await);
        assert!(!limits.allow(a).await);
        assert!(limits.allow(b).await);
    }
}
