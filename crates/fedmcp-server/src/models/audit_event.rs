//! Audit event model.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle action recorded by the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Create,
    Read,
    Update,
    Delete,
    Verify,
    Deploy,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Read => "read",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
            AuditAction::Verify => "verify",
            AuditAction::Deploy => "deploy",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(AuditAction::Create),
            "read" => Ok(AuditAction::Read),
            "update" => Ok(AuditAction::Update),
            "delete" => Ok(AuditAction::Delete),
            "verify" => Ok(AuditAction::Verify),
            "deploy" => Ok(AuditAction::Deploy),
            other => Err(format!("unknown audit action '{}'", other)),
        }
    }
}

/// One immutable entry of the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub event_id: Uuid,
    /// Position in the emitting trail, starting at 0.
    pub sequence: u64,
    #[serde(default)]
    pub artifact_id: Option<String>,
    /// Nil UUID when the action is not artifact-scoped.
    pub workspace_id: String,
    pub action: AuditAction,
    pub actor: String,
    /// Millisecond precision so every backend stores it losslessly.
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl AuditEvent {
    /// Creates an unsealed event stamped with the current time.
    pub fn new(
        sequence: u64,
        action: AuditAction,
        actor: impl Into<String>,
        artifact_id: Option<&str>,
        workspace_id: Option<&str>,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            sequence,
            artifact_id: artifact_id.map(str::to_string),
            workspace_id: workspace_id
                .map(str::to_string)
                .unwrap_or_else(|| Uuid::nil().to_string()),
            action,
            actor: actor.into(),
            timestamp: Utc::now().trunc_subsecs(3),
            metadata,
            prev_hash: None,
            hash: None,
        }
    }
}

/// Row shape of the `audit_events` table.
#[derive(Debug, Clone, FromRow)]
pub struct AuditEventRow {
    pub event_id: Uuid,
    pub sequence: i64,
    pub artifact_id: Option<String>,
    pub workspace_id: String,
    pub action: String,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: serde_json::Value,
    pub prev_hash: Option<String>,
    pub hash: Option<String>,
}

impl TryFrom<AuditEventRow> for AuditEvent {
    type Error = String;

    fn try_from(row: AuditEventRow) -> Result<Self, Self::Error> {
        let metadata = match row.metadata {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => serde_json::Map::new(),
            other => return Err(format!("metadata must be an object, got {}", other)),
        };
        Ok(AuditEvent {
            event_id: row.event_id,
            sequence: u64::try_from(row.sequence)
                .map_err(|_| format!("negative sequence {}", row.sequence))?,
            artifact_id: row.artifact_id,
            workspace_id: row.workspace_id,
            action: row.action.parse()?,
            actor: row.actor,
            timestamp: row.timestamp,
            metadata,
            prev_hash: row.prev_hash,
            hash: row.hash,
        })
    }
}
