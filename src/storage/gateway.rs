use anyhow::{Context, Result};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use super::{ObjectStore, StorageError};
use crate::config::Config;

/// A file written to the spool directory, waiting to be pushed to storage.
///
/// The temp file is removed when this value is dropped.
pub struct SpooledUpload {
    pub file: NamedTempFile,
    pub original_name: String,
    pub content_type: String,
}

pub struct UploadGateway {
    store: Arc<dyn ObjectStore>,
    http: reqwest::Client,
    temp_dir: PathBuf,
    concurrency: usize,
    max_download_bytes: u64,
}

/// Derive a storage key from the upload time and the original file extension.
///
/// `nonce` keeps keys unique when several files land in the same millisecond.
pub fn object_key(original_name: &str, millis: i64, nonce: &str) -> String {
    let ext = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()));

    match ext {
        Some(ext) => format!("{}-{}.{}", millis, nonce, ext),
        None => format!("{}-{}", millis, nonce),
    }
}

fn key_nonce() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}

impl UploadGateway {
    pub fn new(store: Arc<dyn ObjectStore>, config: &Config) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(secs) = config.upload.fetch_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            store,
            http,
            temp_dir: config.upload_temp_dir(),
            concurrency: config.upload.concurrency.max(1),
            max_download_bytes: config.upload.max_download_mb as u64 * 1024 * 1024,
        })
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    /// Push a local file to storage under a fresh key and return its public URL
    pub async fn upload_local_file(
        &self,
        path: &Path,
        original_name: &str,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let body = tokio::fs::read(path)
            .await
            .map_err(|source| StorageError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let key = object_key(original_name, Utc::now().timestamp_millis(), &key_nonce());
        let size = body.len();
        let url = self.store.put_object(&key, body, content_type).await?;

        info!(
            key = %key,
            original_name = %original_name,
            content_type = %content_type,
            size,
            "Photo uploaded"
        );
        Ok(url)
    }

    /// Download an image and push it to storage
    pub async fn upload_from_remote_url(&self, url: &str) -> Result<String, StorageError> {
        let fetch_error = |message: String| StorageError::Fetch {
            url: url.to_string(),
            message,
        };

        let mut response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(fetch_error(format!(
                "remote server returned {}",
                response.status()
            )));
        }

        let too_large = || fetch_error(format!("larger than {} bytes", self.max_download_bytes));
        if response
            .content_length()
            .is_some_and(|len| len > self.max_download_bytes)
        {
            return Err(too_large());
        }

        // Content-Length may be absent or wrong, so count while reading
        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| fetch_error(e.to_string()))?
        {
            if (bytes.len() + chunk.len()) as u64 > self.max_download_bytes {
                return Err(too_large());
            }
            bytes.extend_from_slice(&chunk);
        }

        let name = format!("photo{}.jpg", Utc::now().timestamp_millis());
        let spooled = self.spool(&name, None, bytes).await?;
        self.upload_local_file(
            spooled.file.path(),
            &spooled.original_name,
            &spooled.content_type,
        )
        .await
    }

    /// Write an upload to the spool directory off the async runtime.
    ///
    /// A missing content type is guessed from the original name.
    pub async fn spool(
        &self,
        original_name: &str,
        content_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<SpooledUpload, StorageError> {
        let temp_dir = self.temp_dir.clone();
        let prefix = format!("{}-", Utc::now().timestamp_millis());

        let file = tokio::task::spawn_blocking(move || -> std::io::Result<NamedTempFile> {
            std::fs::create_dir_all(&temp_dir)?;
            let mut file = tempfile::Builder::new()
                .prefix(&prefix)
                .tempfile_in(&temp_dir)?;
            file.write_all(&bytes)?;
            file.flush()?;
            Ok(file)
        })
        .await
        .map_err(|e| StorageError::Spool(std::io::Error::other(e)))??;

        let content_type = match content_type {
            Some(ct) if !ct.is_empty() => ct.to_string(),
            _ => mime_guess::from_path(original_name)
                .first_or_octet_stream()
                .to_string(),
        };

        Ok(SpooledUpload {
            file,
            original_name: original_name.to_string(),
            content_type,
        })
    }

    /// Upload spooled files with bounded concurrency.
    ///
    /// URLs come back in input order. On failure the index of the first failing
    /// file is returned with its error.
    pub async fn upload_spooled(
        &self,
        uploads: &[SpooledUpload],
    ) -> Result<Vec<String>, (usize, StorageError)> {
        let jobs: Vec<(PathBuf, String, String)> = uploads
            .iter()
            .map(|upload| {
                (
                    upload.file.path().to_path_buf(),
                    upload.original_name.clone(),
                    upload.content_type.clone(),
                )
            })
            .collect();

        let results: Vec<Result<String, StorageError>> = stream::iter(jobs)
            .map(|(path, name, content_type)| async move {
                self.upload_local_file(&path, &name, &content_type).await
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut urls = Vec::with_capacity(results.len());
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(url) => urls.push(url),
                Err(e) => {
                    warn!(index, error = %e, "Photo upload failed");
                    return Err((index, e));
                }
            }
        }
        Ok(urls)
    }
}
