//! Audit query endpoint.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::audit::AuditQuery;
use crate::auth::Actor;
use crate::error::AppError;
use crate::models::AuditEvent;
use crate::service::ArtifactService;

#[derive(Serialize)]
pub struct AuditEventsResponse {
    pub events: Vec<AuditEvent>,
}

pub fn router(service: Arc<ArtifactService>) -> Router {
    Router::new()
        .route("/events", get(query_events))
        .with_state(service)
}

/// GET /api/v1/audit/events?artifactId=&workspaceId=&limit=
///
/// Most recent first. `limit` defaults to 100 and is capped at 1000.
async fn query_events(
    State(service): State<Arc<ArtifactService>>,
    _actor: Actor,
    Query(query): Query<AuditQuery>,
) -> Result<Json<AuditEventsResponse>, AppError> {
    let events = service.query_audit(&query).await?;
    Ok(Json(AuditEventsResponse { events }))
}
