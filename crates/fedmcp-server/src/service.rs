//! Artifact lifecycle orchestration.
//!
//! create: validate -> (sign) -> store -> audit
//! get:    load -> audit
//! verify: verify -> audit
//!
//! Failures before persistence emit no audit event. Verification failures
//! are reported to the caller and logged, but not audited.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use fedmcp_core::{
    validate, validate_identifier, Artifact, ArtifactDraft, ArtifactSigner, Jwks, SigningError,
    ValidationError, VerificationError, Verifier,
};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::audit::{AuditError, AuditQuery, AuditTrail};
use crate::config::VersionPolicy;
use crate::models::{AuditAction, AuditEvent, StoredDocument};
use crate::storage::{StorageBackend, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Invalid artifact: {0}")]
    Validation(#[from] ValidationError),

    #[error("Signing failed: {0}")]
    Signing(#[from] SigningError),

    #[error("Storage failed: {0}")]
    Storage(StorageError),

    #[error("Audit failed: {0}")]
    Audit(#[from] AuditError),

    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Version conflict for '{id}': stored version {stored}, requested {requested}")]
    VersionConflict {
        id: String,
        stored: u64,
        requested: u64,
    },

    #[error("Field '{field}' of artifact '{id}' cannot change")]
    ImmutableField { id: String, field: &'static str },

    #[error("Verification failed: {}", .0.category())]
    Verification(#[from] VerificationError),
}

impl From<StorageError> for ServiceError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(id) => ServiceError::NotFound(id),
            other => ServiceError::Storage(other),
        }
    }
}

/// Result of a successful CreateArtifact.
#[derive(Debug, Clone)]
pub struct CreateOutcome {
    pub artifact: Artifact,
    pub token: Option<String>,
    /// `Create` for a fresh id, `Update` when a stored document was replaced.
    pub action: AuditAction,
}

pub struct ArtifactService {
    storage: Arc<dyn StorageBackend>,
    signer: Arc<dyn ArtifactSigner>,
    verifier: Arc<Verifier>,
    audit: Arc<AuditTrail>,
    version_policy: VersionPolicy,
}

impl ArtifactService {
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        signer: Arc<dyn ArtifactSigner>,
        verifier: Arc<Verifier>,
        audit: Arc<AuditTrail>,
        version_policy: VersionPolicy,
    ) -> Self {
        Self {
            storage,
            signer,
            verifier,
            audit,
            version_policy,
        }
    }

    pub fn signer(&self) -> &dyn ArtifactSigner {
        self.signer.as_ref()
    }

    pub fn verifier(&self) -> &Verifier {
        &self.verifier
    }

    pub fn audit_trail(&self) -> &AuditTrail {
        &self.audit
    }

    /// Validates, optionally signs, stores and audits an artifact.
    ///
    /// Missing `id`, `version` and `createdAt` are assigned here: a fresh
    /// UUID, the stored version plus one (or 1), and the current time.
    pub async fn create_artifact(
        &self,
        draft: ArtifactDraft,
        sign: bool,
        actor: &str,
    ) -> Result<CreateOutcome, ServiceError> {
        // Step 1: Resolve against what is already stored
        let existing = match &draft.id {
            Some(id) => {
                validate_identifier("id", id)?;
                self.storage.find(id).await?
            }
            None => None,
        };
        let next_version = existing
            .as_ref()
            .map(|doc| doc.artifact.version.saturating_add(1))
            .unwrap_or(1);

        let artifact = draft.complete(
            Uuid::new_v4().to_string(),
            next_version,
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        );

        // Step 2: Validate
        validate(&artifact)?;
        if let Some(stored) = &existing {
            self.check_version_policy(&stored.artifact, &artifact)?;
        }

        // Step 3: Sign
        let token = if sign {
            Some(self.signer.sign(&artifact).await?)
        } else {
            None
        };

        // Step 4: Persist
        let document = StoredDocument::new(artifact.clone(), token.clone());
        self.storage.store(&artifact.id, &document).await?;

        // Step 5: Audit what happened to durable state
        let action = if existing.is_some() {
            AuditAction::Update
        } else {
            AuditAction::Create
        };
        let mut metadata = Map::new();
        metadata.insert("version".into(), json!(artifact.version));
        metadata.insert("type".into(), json!(artifact.artifact_type));
        metadata.insert("signed".into(), json!(token.is_some()));
        if token.is_some() {
            metadata.insert("kid".into(), json!(self.signer.key_id()));
        }
        self.audit
            .record(
                action,
                actor,
                Some(&artifact.id),
                Some(&artifact.workspace_id),
                Some(metadata),
            )
            .await?;

        tracing::info!(
            artifact_id = %artifact.id,
            workspace_id = %artifact.workspace_id,
            version = artifact.version,
            signed = token.is_some(),
            action = %action,
            "artifact stored"
        );

        Ok(CreateOutcome {
            artifact,
            token,
            action,
        })
    }

    /// `workspaceId` and `type` never change for a stored id and its version
    /// never goes down. Monotonic additionally rejects an equal version.
    fn check_version_policy(&self, stored: &Artifact, incoming: &Artifact) -> Result<(), ServiceError> {
        if incoming.workspace_id != stored.workspace_id {
            return Err(ServiceError::ImmutableField {
                id: incoming.id.clone(),
                field: "workspaceId",
            });
        }
        if incoming.artifact_type != stored.artifact_type {
            return Err(ServiceError::ImmutableField {
                id: incoming.id.clone(),
                field: "type",
            });
        }
        let stale = match self.version_policy {
            VersionPolicy::Overwrite => incoming.version < stored.version,
            VersionPolicy::Monotonic => incoming.version <= stored.version,
        };
        if stale {
            return Err(ServiceError::VersionConflict {
                id: incoming.id.clone(),
                stored: stored.version,
                requested: incoming.version,
            });
        }
        Ok(())
    }

    /// Loads a stored document and audits the read.
    pub async fn get_artifact(&self, artifact_id: &str, actor: &str) -> Result<StoredDocument, ServiceError> {
        // An id that is not an identifier can never have been stored.
        if validate_identifier("id", artifact_id).is_err() {
            return Err(ServiceError::NotFound(artifact_id.to_string()));
        }

        let document = self.storage.get(artifact_id).await?;
        self.audit
            .record(
                AuditAction::Read,
                actor,
                Some(artifact_id),
                Some(document.workspace_id()),
                None,
            )
            .await?;
        Ok(document)
    }

    /// Verifies a token and, on success, audits the verification.
    pub async fn verify_token(
        &self,
        token: &str,
        expected_workspace: Option<&str>,
        actor: &str,
    ) -> Result<Artifact, ServiceError> {
        let artifact = match self.verifier.verify(token, expected_workspace) {
            Ok(artifact) => artifact,
            Err(e) => {
                tracing::debug!(category = e.category(), error = %e, "token verification failed");
                return Err(e.into());
            }
        };

        let metadata = expected_workspace.map(|ws| {
            let mut metadata = Map::new();
            metadata.insert("expectedWorkspace".into(), Value::String(ws.to_string()));
            metadata
        });
        self.audit
            .record(
                AuditAction::Verify,
                actor,
                Some(&artifact.id),
                Some(&artifact.workspace_id),
                metadata,
            )
            .await?;
        Ok(artifact)
    }

    /// Sorted artifact ids, restricted to `workspace_id` when given.
    ///
    /// Backends that cannot filter are filtered here by loading each
    /// document, so every backend yields the same result.
    pub async fn list_artifacts(&self, workspace_id: Option<&str>) -> Result<Vec<String>, ServiceError> {
        let ids = self.storage.list(workspace_id).await?;
        let workspace_id = match workspace_id {
            Some(ws) if !self.storage.filters_by_workspace() => ws,
            _ => return Ok(ids),
        };

        let mut matching = Vec::new();
        for id in ids {
            match self.storage.get(&id).await {
                Ok(document) if document.workspace_id() == workspace_id => matching.push(id),
                Ok(_) | Err(StorageError::NotFound(_)) => {}
                Err(StorageError::Corrupt { id, reason }) => {
                    tracing::warn!(artifact_id = %id, %reason, "skipping unreadable artifact document");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(matching)
    }

    pub async fn query_audit(&self, query: &AuditQuery) -> Result<Vec<AuditEvent>, ServiceError> {
        Ok(self.audit.query(query).await?)
    }

    /// The signer's own public key. Federated keys in the keyring are not
    /// republished.
    pub fn publish_keys(&self) -> Jwks {
        Jwks {
            keys: vec![self.signer.public_key_descriptor()],
        }
    }
}
