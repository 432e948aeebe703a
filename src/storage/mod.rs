//! Photo storage.
//!
//! [`ObjectStore`] is the seam to the storage service (S3 in production, a
//! local directory for development). [`UploadGateway`] sits on top of it and
//! owns the upload flows: pushing a spooled local file and pulling an image
//! from a remote URL.

mod gateway;
mod local;
mod s3;

pub use gateway::{object_key, SpooledUpload, UploadGateway};
pub use local::LocalStore;
pub use s3::S3Store;

use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{Config, StorageBackend};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to spool upload: {0}")]
    Spool(#[from] std::io::Error),
    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },
    #[error("{backend} rejected object {key}: {message}")]
    Backend {
        backend: &'static str,
        key: String,
        message: String,
    },
}

impl StorageError {
    /// Whether the failure came from a service outside this process
    pub fn is_upstream(&self) -> bool {
        matches!(self, StorageError::Fetch { .. } | StorageError::Backend { .. })
    }
}

/// Durable, publicly readable object storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `body` under `key` with public-read access and return its public URL
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError>;

    fn name(&self) -> &'static str;
}

/// Join a public base URL and an object key
pub fn public_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key)
}

/// Build the object store selected by `storage.backend`
pub async fn build_store(config: &Config) -> Result<Arc<dyn ObjectStore>> {
    let store: Arc<dyn ObjectStore> = match config.storage.backend {
        StorageBackend::S3 => Arc::new(S3Store::from_config(&config.storage).await),
        StorageBackend::Local => Arc::new(
            LocalStore::new(
                config.server.uploads_dir.clone(),
                config
                    .storage
                    .public_base_url
                    .clone()
                    .unwrap_or_else(|| "/uploads".to_string()),
            )
            .await?,
        ),
    };
    tracing::info!(backend = store.name(), "Object storage ready");
    Ok(store)
}
