use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::handlers;
use super::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/info", post(handlers::info))
        .route("/download", post(handlers::download))
        .route("/progress/{id}", get(handlers::progress))
        .route("/file/{filename}", get(handlers::file))
        .route("/cleanup", post(handlers::cleanup))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
