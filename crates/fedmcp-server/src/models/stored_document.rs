//! Stored artifact document: the artifact plus its optional signed token.

use fedmcp_core::Artifact;
use serde::{Deserialize, Serialize};

/// Storage-agnostic document layout, keyed externally by artifact id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    /// The full artifact.
    pub artifact: Artifact,
    /// Compact signed token. Older documents name this field `jws`.
    #[serde(default, alias = "jws", skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl StoredDocument {
    pub fn new(artifact: Artifact, token: Option<String>) -> Self {
        Self { artifact, token }
    }

    pub fn workspace_id(&self) -> &str {
        &self.artifact.workspace_id
    }
}
