//! API Routes
//!
//! Configures the Axum router with all demo server endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    health_handler, index_handler, multiple_suspense_handler, mutate_handler, stats_handler,
    without_suspense_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /` - Time rendered with and without suspense
/// - `GET /without-suspense` - Loading state of the time key
/// - `GET /multiple-suspense` - Four boundaries loading independently
/// - `POST /mutate/:key` - Invalidate a key and refetch it
/// - `GET /stats` - Get cache statistics
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index_handler))
        .route("/without-suspense", get(without_suspense_handler))
        .route("/multiple-suspense", get(multiple_suspense_handler))
        .route("/mutate/:key", post(mutate_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
