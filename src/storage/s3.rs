//! Amazon S3 (or S3-compatible) object store.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    error::DisplayErrorContext, primitives::ByteStream, types::ObjectCannedAcl, Client,
};
use aws_types::region::Region;
use tracing::debug;

use super::{public_url, ObjectStore, StorageError};
use crate::config::StorageConfig;

pub struct S3Store {
    client: Client,
    bucket: String,
    base_url: String,
}

impl S3Store {
    /// Build a client from config.
    ///
    /// Static credentials are used when both halves are configured; otherwise
    /// the default AWS provider chain applies.
    pub async fn from_config(config: &StorageConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let (Some(key_id), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            loader = loader.credentials_provider(Credentials::new(
                key_id.clone(),
                secret.clone(),
                None,
                None,
                "report-desk-config",
            ));
        }

        let shared = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
            base_url: base_url(config),
        }
    }
}

/// Public URL prefix for objects in the configured bucket
fn base_url(config: &StorageConfig) -> String {
    config
        .public_base_url
        .clone()
        .unwrap_or_else(|| format!("https://{}.s3.amazonaws.com", config.bucket))
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let size = body.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| StorageError::Backend {
                backend: self.name(),
                key: key.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        debug!(bucket = %self.bucket, key = %key, size, "Stored object in S3");
        Ok(public_url(&self.base_url, key))
    }

    fn name(&self) -> &'static str {
        "s3"
    }
}
