//! Public key publication (JWKS).

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use fedmcp_core::Jwks;

use crate::service::ArtifactService;

/// `/jwks`, mounted under the API prefix.
pub fn router(service: Arc<ArtifactService>) -> Router {
    Router::new()
        .route("/jwks", get(jwks))
        .with_state(service)
}

/// `/.well-known/jwks.json` at the root.
pub fn well_known_router(service: Arc<ArtifactService>) -> Router {
    Router::new()
        .route("/.well-known/jwks.json", get(jwks))
        .with_state(service)
}

/// GET /api/v1/jwks
///
/// Unauthenticated: peers fetch this to federate with this workspace.
async fn jwks(State(service): State<Arc<ArtifactService>>) -> Json<Jwks> {
    Json(service.publish_keys())
}
