//! Router construction: the two WebSocket upgrade routes plus a health
//! check (spec §6). Grounded on `gglib-axum::routes`'s
//! `build_cors_layer`/`create_router` pattern; this server has no REST
//! surface to nest under `/api`.

use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::bootstrap::CorsConfig;
use crate::handlers;
use crate::state::AppState;

fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    match config {
        CorsConfig::AllowAll => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
        CorsConfig::AllowOrigins(origins) => {
            use axum::http::HeaderValue;
            let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            CorsLayer::new().allow_origin(allowed).allow_methods(Any).allow_headers(Any)
        }
    }
}

/// Build the full router: `/ws/audio` (solo mode), `/ws/session` (room
/// mode), and `/health`.
pub fn create_router(state: AppState, cors_config: &CorsConfig) -> Router {
    let cors = build_cors_layer(cors_config);

    Router::new()
        .route("/health", get(health_check))
        .route("/ws/audio", get(handlers::solo::solo_ws))
        .route("/ws/session", get(handlers::room::room_ws))
        .with_state(state)
        .layer(cors)
}

async fn health_check() -> &'static str {
    "OK"
}
