//! API routes for the FedMCP server.

pub mod artifacts;
pub mod audit;
pub mod health;
pub mod keys;

use std::sync::Arc;

use axum::{middleware, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::digest::content_digest;
use crate::service::ArtifactService;

/// Creates the main router with all routes mounted.
pub fn create_router(service: Arc<ArtifactService>) -> Router {
    Router::new()
        .merge(health::router())
        .merge(keys::well_known_router(service.clone()))
        .nest("/api/v1", api_v1_routes(service))
        .layer(middleware::from_fn(content_digest))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Creates the v1 API routes.
fn api_v1_routes(service: Arc<ArtifactService>) -> Router {
    Router::new()
        .nest("/artifacts", artifacts::router(service.clone()))
        .nest("/audit", audit::router(service.clone()))
        .merge(keys::router(service))
}
