//! Router and Application State

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::hub::Hub;
use crate::ws;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// The signaling and admission hub
    pub hub: Arc<Hub>,
    /// Server configuration
    pub config: Arc<Config>,
}

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    // In production, set CORS_ALLOWED_ORIGINS to specific origins
    let cors = if state.config.cors_allowed_origins.iter().any(|o| o == "*") {
        // Development mode: allow any origin
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        use axum::http::{header, Method};
        let origins: Vec<_> = state
            .config
            .cors_allowed_origins
            .iter()
            .filter_map(|o| {
                if let Ok(origin) = o.parse() {
                    Some(origin)
                } else {
                    tracing::warn!(origin = %o, "Invalid CORS origin in configuration, skipping");
                    None
                }
            })
            .collect();

        if origins.is_empty() {
            tracing::error!(
                "No valid CORS origins configured! All cross-origin requests will fail."
            );
        }

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            .allow_credentials(true)
    };

    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws::handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness probe.
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
