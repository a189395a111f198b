//! The artifact document: the unit of signing, storage and audit.
//!
//! An artifact is identified by its `id` and snapshotted by `(id, version)`.
//! Every field except `jsonBody` is structural and checked by [`validate`];
//! the body is opaque JSON.

use chrono::DateTime;
use serde::{Deserialize, Serialize};

/// Maximum length of an artifact or workspace identifier.
pub const MAX_IDENTIFIER_LEN: usize = 128;

/// Kind of artifact. Unknown kinds are rejected at deserialization.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactType {
    Policy,
    PromptTemplate,
    ToolManifest,
}

impl ArtifactType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactType::Policy => "policy",
            ArtifactType::PromptTemplate => "prompt-template",
            ArtifactType::ToolManifest => "tool-manifest",
        }
    }
}

impl std::fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A versioned, workspace-scoped JSON document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub id: String,
    #[serde(rename = "type")]
    pub artifact_type: ArtifactType,
    pub version: u64,
    pub workspace_id: String,
    /// RFC 3339 UTC timestamp, kept verbatim so signed bytes are reproducible.
    pub created_at: String,
    pub json_body: serde_json::Value,
}

/// Artifact as submitted for creation, before orchestration fills in the
/// fields it owns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactDraft {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub artifact_type: ArtifactType,
    #[serde(default)]
    pub version: Option<u64>,
    pub workspace_id: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub json_body: serde_json::Value,
}

impl ArtifactDraft {
    /// Completes the draft. Supplied values win over the defaults.
    pub fn complete(self, default_id: String, default_version: u64, now: String) -> Artifact {
        Artifact {
            id: self.id.unwrap_or(default_id),
            artifact_type: self.artifact_type,
            version: self.version.unwrap_or(default_version),
            workspace_id: self.workspace_id,
            created_at: self.created_at.unwrap_or(now),
            json_body: self.json_body,
        }
    }
}

/// Structural problems with an artifact. All are caller-fixable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid {field}: {reason}")]
    InvalidIdentifier { field: &'static str, reason: String },

    #[error("invalid createdAt: {0}")]
    InvalidTimestamp(String),

    #[error("malformed artifact: {0}")]
    Malformed(String),
}

/// Checks an artifact's structural fields. Pure; no side effects.
///
/// `type` and the non-negativity of `version` are already enforced by the
/// Rust types, so only identifiers and the timestamp need checking here.
pub fn validate(artifact: &Artifact) -> Result<(), ValidationError> {
    validate_identifier("id", &artifact.id)?;
    validate_identifier("workspaceId", &artifact.workspace_id)?;
    validate_timestamp(&artifact.created_at)?;
    Ok(())
}

/// Parses an untyped JSON value into an artifact and validates it.
pub fn parse_artifact(value: serde_json::Value) -> Result<Artifact, ValidationError> {
    let artifact: Artifact =
        serde_json::from_value(value).map_err(|e| ValidationError::Malformed(e.to_string()))?;
    validate(&artifact)?;
    Ok(artifact)
}

/// Identifiers are 1..=128 chars of `[A-Za-z0-9._:-]` and may not start
/// with a dot. They double as file and object names.
pub fn validate_identifier(field: &'static str, value: &str) -> Result<(), ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidIdentifier {
        field,
        reason: reason.to_string(),
    };

    if value.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(invalid(&format!(
            "longer than {} characters",
            MAX_IDENTIFIER_LEN
        )));
    }
    if value.starts_with('.') {
        return Err(invalid("must not start with '.'"));
    }
    if let Some(c) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ':' | '-')))
    {
        return Err(invalid(&format!("contains disallowed character {:?}", c)));
    }
    Ok(())
}

fn validate_timestamp(value: &str) -> Result<(), ValidationError> {
    let parsed = DateTime::parse_from_rfc3339(value)
        .map_err(|e| ValidationError::InvalidTimestamp(format!("{}: {}", value, e)))?;
    if parsed.offset().local_minus_utc() != 0 {
        return Err(ValidationError::InvalidTimestamp(format!(
            "{}: offset must be UTC",
            value
        )));
    }
    Ok(())
}
