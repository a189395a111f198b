//! Artifact lifecycle endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use fedmcp_core::{Artifact, ArtifactDraft};
use serde::{Deserialize, Serialize};

use crate::auth::Actor;
use crate::error::AppError;
use crate::models::StoredDocument;
use crate::service::{ArtifactService, ServiceError};

fn default_sign() -> bool {
    true
}

/// Request body for artifact creation.
#[derive(Debug, Deserialize)]
pub struct CreateArtifactRequest {
    /// Artifact fields; `id`, `version` and `createdAt` may be omitted.
    pub artifact: serde_json::Value,
    #[serde(default = "default_sign")]
    pub sign: bool,
}

/// Response for successful artifact creation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateArtifactResponse {
    /// Compact signed token; empty when the artifact was stored unsigned.
    pub token: String,
    pub artifact_id: String,
    pub workspace_id: String,
    pub version: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListArtifactsQuery {
    #[serde(alias = "workspace_id")]
    pub workspace_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListArtifactsResponse {
    pub artifacts: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    #[serde(alias = "token")]
    pub jws: String,
    pub expected_workspace: Option<String>,
}

/// Verification outcome. Failures carry only a coarse category.
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Artifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Creates the artifacts router.
pub fn router(service: Arc<ArtifactService>) -> Router {
    Router::new()
        .route("/", post(create_artifact).get(list_artifacts))
        .route("/verify", post(verify_artifact))
        .route("/{artifact_id}", get(get_artifact))
        .with_state(service)
}

/// POST /api/v1/artifacts
///
/// Validates, optionally signs, stores and audits an artifact.
async fn create_artifact(
    State(service): State<Arc<ArtifactService>>,
    actor: Actor,
    Json(request): Json<CreateArtifactRequest>,
) -> Result<Json<CreateArtifactResponse>, AppError> {
    let draft: ArtifactDraft = serde_json::from_value(request.artifact)
        .map_err(|e| AppError::BadRequest(format!("Invalid artifact: {}", e)))?;

    let outcome = service
        .create_artifact(draft, request.sign, actor.as_str())
        .await?;

    Ok(Json(CreateArtifactResponse {
        token: outcome.token.unwrap_or_default(),
        artifact_id: outcome.artifact.id,
        workspace_id: outcome.artifact.workspace_id,
        version: outcome.artifact.version,
    }))
}

/// GET /api/v1/artifacts?workspaceId=
async fn list_artifacts(
    State(service): State<Arc<ArtifactService>>,
    _actor: Actor,
    Query(query): Query<ListArtifactsQuery>,
) -> Result<Json<ListArtifactsResponse>, AppError> {
    let artifacts = service
        .list_artifacts(query.workspace_id.as_deref())
        .await?;
    Ok(Json(ListArtifactsResponse {
        count: artifacts.len(),
        artifacts,
    }))
}

/// GET /api/v1/artifacts/{artifact_id}
async fn get_artifact(
    State(service): State<Arc<ArtifactService>>,
    actor: Actor,
    Path(artifact_id): Path<String>,
) -> Result<Json<StoredDocument>, AppError> {
    let document = service.get_artifact(&artifact_id, actor.as_str()).await?;
    Ok(Json(document))
}

/// POST /api/v1/artifacts/verify
///
/// Verification failures are a normal `200` with `valid: false`.
async fn verify_artifact(
    State(service): State<Arc<ArtifactService>>,
    actor: Actor,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, AppError> {
    match service
        .verify_token(
            &request.jws,
            request.expected_workspace.as_deref(),
            actor.as_str(),
        )
        .await
    {
        Ok(artifact) => Ok(Json(VerifyResponse {
            valid: true,
            artifact: Some(artifact),
            error: None,
        })),
        Err(ServiceError::Verification(e)) => Ok(Json(VerifyResponse {
            valid: false,
            artifact: None,
            error: Some(e.category().to_string()),
        })),
        Err(e) => Err(e.into()),
    }
}
