use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    let message = post(handlers::post_message).fallback(handlers::method_not_allowed);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Relay
        .route("/message", message.clone())
        .route("/.netlify/functions/message", message)
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        // The front-end may be served from another origin
        .layer(CorsLayer::permissive())
        .with_state(state)
}
