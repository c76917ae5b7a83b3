//! API integration tests.
//!
//! The full router needs live Firestore/storage credentials; without them
//! these tests fall back to a minimal router carrying the same middleware
//! stack, which is enough to pin down envelope, header and routing
//! behavior.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

/// Helper to create a test router.
async fn create_test_router() -> axum::Router {
    use jhive_api::{create_router, ApiConfig, AppState};

    dotenvy::dotenv().ok();

    if let Ok(config) = ApiConfig::from_env() {
        if let Ok(state) = AppState::new(config).await {
            return create_router(state, None);
        }
    }

    // Minimal fallback with the same cross-cutting middleware
    use axum::middleware;
    use axum::routing::get;
    use jhive_api::handlers::health::health;
    use jhive_api::middleware::{request_id, security_headers};

    axum::Router::new()
        .route("/api/health", get(health))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
}

#[tokio::test]
async fn health_endpoint_responds() {
    let app = create_test_router().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn security_headers_present() {
    let app = create_test_router().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let headers = response.headers();
    assert!(headers.contains_key("X-Content-Type-Options"));
    assert!(headers.contains_key("X-Frame-Options"));
    assert!(headers.contains_key("X-Request-ID"));
}

#[tokio::test]
async fn request_id_is_propagated() {
    let app = create_test_router().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .header("X-Request-ID", "test-request-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers().get("X-Request-ID").unwrap(),
        "test-request-42"
    );
}

#[tokio::test]
async fn unknown_route_is_404() {
    let app = create_test_router().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
