use async_trait::async_trait;
use std::path::PathBuf;

use super::{public_url, ObjectStore, StorageError};

/// Stores objects in a directory that the API serves under `/uploads`
pub struct LocalStore {
    root: PathBuf,
    base_url: String,
}

impl LocalStore {
    pub async fn new(root: PathBuf, base_url: String) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root, base_url })
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        // Keys are generated server-side, but never let one escape the root
        if key.contains('/') || key.contains('\\') || key.starts_with('.') {
            return Err(StorageError::Backend {
                backend: self.name(),
                key: key.to_string(),
                message: "invalid object key".to_string(),
            });
        }

        let path = self.root.join(key);
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| StorageError::Backend {
                backend: self.name(),
                key: key.to_string(),
                message: e.to_string(),
            })?;

        Ok(public_url(&self.base_url, key))
    }

    fn name(&self) -> &'static str {
        "local"
    }
}
