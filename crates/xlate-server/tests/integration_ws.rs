//! Integration tests exercising the router as a whole rather than unit
//! pieces — grounded on `gglib-axum/tests/integration_routes.rs`'s
//! `test_config()` + `tower::ServiceExt::oneshot` pattern.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use xlate_server::bootstrap::{bootstrap, CorsConfig, ServerConfig};
use xlate_server::routes::create_router;

fn test_config() -> ServerConfig {
    ServerConfig { port: 0, ..ServerConfig::default() }
}

#[tokio::test]
async fn health_endpoint_returns_ok() {
    let state = bootstrap(&test_config()).await.unwrap();
    let app = create_router(state, &CorsConfig::AllowAll);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"OK");
}

/// A GET to a WS route without the `Upgrade` handshake headers never
/// reaches our handler logic — axum's `WebSocketUpgrade` extractor
/// rejects it with 400 first.
#[tokio::test]
async fn solo_ws_route_rejects_non_upgrade_requests() {
    let state = bootstrap(&test_config()).await.unwrap();
    let app = create_router(state, &CorsConfig::AllowAll);

    let response = app
        .oneshot(Request::builder().uri("/ws/audio").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn room_ws_route_rejects_non_upgrade_requests() {
    let state = bootstrap(&test_config()).await.unwrap();
    let app = create_router(state, &CorsConfig::AllowAll);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/ws/session?my_lang=en&partner_lang=es")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let state = bootstrap(&test_config()).await.unwrap();
    let app = create_router(state, &CorsConfig::AllowAll);

    let response = app
        .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
