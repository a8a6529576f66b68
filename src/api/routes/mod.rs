//! API routes module - organizes all route handlers.
//!
//! Everything here is mounted under `/api/v1` by the server binary.

pub mod app_state;
pub mod error;
pub mod links;
pub mod openapi;
pub mod packages;
pub mod responses;

use axum::{Router, response::Json, routing::get};
use serde_json::{Value, json};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
pub use app_state::AppState;
pub use error::ApiError;

/// Create the main API router combining all route modules
///
/// State is applied by callers (the server binary or a `TestServer`) with
/// `.with_state(app_state)`.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .merge(packages::packages_router())
        // OpenAPI documentation endpoints
        .merge(openapi::openapi_router())
}

/// Build the complete application: health checks plus the API nested under `/api/v1`,
/// with state applied and request tracing enabled.
pub fn create_app(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/health", get(health_check))
        .nest("/api/v1", create_api_router())
        .with_state(app_state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Create application state backed by in-memory storage.
pub fn create_app_state(config: ServerConfig) -> AppState {
    AppState::new(config)
}

/// Create the application state with storage initialization (async).
///
/// This is the preferred method for production use.
pub async fn create_app_state_with_storage(
    config: ServerConfig,
) -> Result<AppState, crate::storage::StorageError> {
    let mut state = AppState::new(config);
    state.init_storage().await?;
    Ok(state)
}
