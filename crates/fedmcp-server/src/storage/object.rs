//! Object-storage backend: one object per artifact at `<prefix>/<id>.json`.
//!
//! Listing only enumerates keys; workspace filtering is left to the caller.

use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};

use super::{check_key, StorageBackend, StorageError, DOCUMENT_EXTENSION};
use crate::models::StoredDocument;

#[derive(Debug, Clone)]
pub struct ObjectStorage {
    store: Arc<dyn ObjectStore>,
    prefix: Path,
}

impl ObjectStorage {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: &str) -> Self {
        Self {
            store,
            prefix: Path::from(prefix),
        }
    }

    /// S3 bucket, with credentials and region taken from the standard
    /// `AWS_*` environment variables.
    pub fn s3(bucket: &str, prefix: &str) -> Result<Self, StorageError> {
        let store = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .build()?;
        Ok(Self::new(Arc::new(store), prefix))
    }

    fn object_path(&self, artifact_id: &str) -> Result<Path, StorageError> {
        check_key(artifact_id)?;
        Ok(self
            .prefix
            .child(format!("{}{}", artifact_id, DOCUMENT_EXTENSION)))
    }
}

#[async_trait]
impl StorageBackend for ObjectStorage {
    async fn store(&self, artifact_id: &str, document: &StoredDocument) -> Result<(), StorageError> {
        let path = self.object_path(artifact_id)?;
        let bytes = serde_json::to_vec(document)?;
        self.store.put(&path, PutPayload::from(bytes)).await?;

        tracing::debug!(artifact_id, key = %path, "stored artifact object");
        Ok(())
    }

    async fn get(&self, artifact_id: &str) -> Result<StoredDocument, StorageError> {
        let path = self.object_path(artifact_id)?;
        let bytes = match self.store.get(&path).await {
            Ok(result) => result.bytes().await?,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(StorageError::NotFound(artifact_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(|e| StorageError::Corrupt {
            id: artifact_id.to_string(),
            reason: e.to_string(),
        })
    }

    async fn list(&self, _workspace_id: Option<&str>) -> Result<Vec<String>, StorageError> {
        let prefix_depth = self.prefix.parts().count();
        let objects: Vec<_> = self.store.list(Some(&self.prefix)).try_collect().await?;

        let mut ids: Vec<String> = objects
            .iter()
            // Only direct children of the prefix.
            .filter(|meta| meta.location.parts().count() == prefix_depth + 1)
            .filter_map(|meta| meta.location.filename())
            .filter_map(|name| name.strip_suffix(DOCUMENT_EXTENSION))
            .filter(|id| check_key(id).is_ok())
            .map(str::to_string)
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn filters_by_workspace(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "object"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tests::{document, exercise_backend};
    use object_store::memory::InMemory;

    #[tokio::test]
    async fn test_object_backend_contract() {
        let storage = ObjectStorage::new(Arc::new(InMemory::new()), "artifacts");
        exercise_backend(&storage).await;
    }

    #[tokio::test]
    async fn test_objects_live_under_prefix() {
        let memory = Arc::new(InMemory::new());
        let storage = ObjectStorage::new(memory.clone(), "artifacts");
        storage.store("a1", &document("a1", "ws-1", Some("h.p.s"))).await.unwrap();

        let raw = memory
            .get(&Path::from("artifacts/a1.json"))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(value["token"], "h.p.s");
        assert_eq!(value["artifact"]["workspaceId"], "ws-1");
    }

    #[tokio::test]
    async fn test_list_ignores_workspace_and_foreign_keys() {
        let memory = Arc::new(InMemory::new());
        let storage = ObjectStorage::new(memory.clone(), "artifacts");
        storage.store("b2", &document("b2", "ws-2", None)).await.unwrap();
        storage.store("a1", &document("a1", "ws-1", None)).await.unwrap();

        memory
            .put(&Path::from("artifacts/nested/x.json"), PutPayload::from_static(b"{}"))
            .await
            .unwrap();
        memory
            .put(&Path::from("other/c3.json"), PutPayload::from_static(b"{}"))
            .await
            .unwrap();

        assert!(!storage.filters_by_workspace());
        assert_eq!(storage.list(Some("ws-1")).await.unwrap(), vec!["a1", "b2"]);
    }
}
