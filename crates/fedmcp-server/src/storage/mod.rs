//! Artifact storage backends.
//!
//! Documents are keyed by artifact id only; a store overwrites whatever was
//! there. Version policy is enforced above this layer.

pub mod fs;
pub mod object;

use async_trait::async_trait;

use crate::models::StoredDocument;

pub use fs::FilesystemStorage;
pub use object::ObjectStorage;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Invalid artifact key '{0}'")]
    InvalidKey(String),

    #[error("Corrupt document for '{id}': {reason}")]
    Corrupt { id: String, reason: String },

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Persists `document` under `artifact_id`, replacing any previous one.
    async fn store(&self, artifact_id: &str, document: &StoredDocument) -> Result<(), StorageError>;

    /// Returns [`StorageError::NotFound`] when nothing is stored under the id.
    async fn get(&self, artifact_id: &str) -> Result<StoredDocument, StorageError>;

    /// Sorted artifact ids. When `filters_by_workspace()` is false the
    /// `workspace_id` argument is ignored and the caller must filter.
    async fn list(&self, workspace_id: Option<&str>) -> Result<Vec<String>, StorageError>;

    /// Whether `list` honours its workspace filter.
    fn filters_by_workspace(&self) -> bool;

    fn backend_name(&self) -> &'static str;

    /// Like `get`, but absence is `Ok(None)`.
    async fn find(&self, artifact_id: &str) -> Result<Option<StoredDocument>, StorageError> {
        match self.get(artifact_id).await {
            Ok(document) => Ok(Some(document)),
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Ids double as file and object names, so they must be valid identifiers.
pub(crate) fn check_key(artifact_id: &str) -> Result<(), StorageError> {
    fedmcp_core::validate_identifier("id", artifact_id)
        .map_err(|_| StorageError::InvalidKey(artifact_id.to_string()))
}

pub(crate) const DOCUMENT_EXTENSION: &str = ".json";
