//! Filesystem storage: one `<id>.json` file per artifact under a root
//! directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use uuid::Uuid;

use super::{check_key, StorageBackend, StorageError, DOCUMENT_EXTENSION};
use crate::models::StoredDocument;

#[derive(Debug, Clone)]
pub struct FilesystemStorage {
    root: PathBuf,
}

impl FilesystemStorage {
    /// The root directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, artifact_id: &str) -> Result<PathBuf, StorageError> {
        check_key(artifact_id)?;
        Ok(self.root.join(format!("{}{}", artifact_id, DOCUMENT_EXTENSION)))
    }

    async fn read_document(&self, artifact_id: &str, path: &Path) -> Result<StoredDocument, StorageError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(artifact_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(|e| StorageError::Corrupt {
            id: artifact_id.to_string(),
            reason: e.to_string(),
        })
    }

    /// Ids of every `<id>.json` in the root. Temp files start with `.` and
    /// are never valid ids.
    async fn scan(&self) -> Result<Vec<String>, StorageError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(id) = name.strip_suffix(DOCUMENT_EXTENSION) else { continue };
            if check_key(id).is_ok() && entry.file_type().await?.is_file() {
                ids.push(id.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl StorageBackend for FilesystemStorage {
    async fn store(&self, artifact_id: &str, document: &StoredDocument) -> Result<(), StorageError> {
        let path = self.document_path(artifact_id)?;
        let bytes = serde_json::to_vec(document)?;

        tokio::fs::create_dir_all(&self.root).await?;

        // Write-then-rename so readers never observe a partial document.
        let tmp = self
            .root
            .join(format!(".{}.{}.tmp", artifact_id, Uuid::new_v4().simple()));
        if let Err(e) = tokio::fs::write(&tmp, &bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        tracing::debug!(artifact_id, path = %path.display(), "stored artifact document");
        Ok(())
    }

    async fn get(&self, artifact_id: &str) -> Result<StoredDocument, StorageError> {
        let path = self.document_path(artifact_id)?;
        self.read_document(artifact_id, &path).await
    }

    async fn list(&self, workspace_id: Option<&str>) -> Result<Vec<String>, StorageError> {
        let ids = self.scan().await?;
        let Some(workspace_id) = workspace_id else {
            return Ok(ids);
        };

        // Filtering opens every document.
        let mut matching = Vec::new();
        for id in ids {
            let path = self.document_path(&id)?;
            match self.read_document(&id, &path).await {
                Ok(document) if document.workspace_id() == workspace_id => matching.push(id),
                Ok(_) | Err(StorageError::NotFound(_)) => {}
                Err(e) => {
                    tracing::warn!(artifact_id = %id, error = %e, "skipping unreadable artifact document");
                }
            }
        }
        Ok(matching)
    }

    fn filters_by_workspace(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}
