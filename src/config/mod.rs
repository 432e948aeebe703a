use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::auth::SaltPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Directory served under `/uploads` and written by the local storage backend
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,
    /// Front-end origin allowed to make credentialed cross-origin requests
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            uploads_dir: default_uploads_dir(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4000
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_uploads_dir() -> PathBuf {
    PathBuf::from("./uploads")
}

fn default_cors_origin() -> String {
    "http://localhost:5173".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite:./data/report-desk.db?mode=rwc".to_string()
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for session tokens. Changing it invalidates every issued token.
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default)]
    pub salt_policy: SaltPolicy,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            salt_policy: SaltPolicy::default(),
            cookie_name: default_cookie_name(),
        }
    }
}

fn default_jwt_secret() -> String {
    // Sessions will not survive a restart unless a secret is configured
    uuid::Uuid::new_v4().simple().to_string()
}

fn default_cookie_name() -> String {
    "token".to_string()
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    S3,
    Local,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_backend")]
    pub backend: StorageBackend,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Custom endpoint for S3-compatible services (MinIO, R2, ...)
    pub endpoint: Option<String>,
    /// Prefix for returned object URLs. Defaults to the bucket's virtual-host URL
    /// for S3 and to `/uploads` for local storage.
    pub public_base_url: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            bucket: default_bucket(),
            region: default_region(),
            access_key_id: None,
            secret_access_key: None,
            endpoint: None,
            public_base_url: None,
        }
    }
}

fn default_storage_backend() -> StorageBackend {
    StorageBackend::S3
}

fn default_bucket() -> String {
    "report-app".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Maximum number of files accepted by a single `/upload` request
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    /// Number of files pushed to the object store at the same time
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Request body limit for upload endpoints, in megabytes
    #[serde(default = "default_max_body_mb")]
    pub max_body_mb: usize,
    /// Largest image accepted from `/upload-by-link`, in megabytes
    #[serde(default = "default_max_download_mb")]
    pub max_download_mb: usize,
    /// Timeout for fetching remote images, in seconds (none by default)
    pub fetch_timeout_secs: Option<u64>,
    /// Where uploads are spooled before being sent to storage (system temp dir by default)
    pub temp_dir: Option<PathBuf>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            concurrency: default_concurrency(),
            max_body_mb: default_max_body_mb(),
            max_download_mb: default_max_download_mb(),
            fetch_timeout_secs: None,
            temp_dir: None,
        }
    }
}

fn default_max_files() -> usize {
    100
}

fn default_concurrency() -> usize {
    4
}

fn default_max_download_mb() -> usize {
    25
}

fn default_max_body_mb() -> usize {
    200
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&content)?
        } else {
            info!("No config file found, using defaults");
            Config::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse configuration file")
    }

    /// Apply deployment secrets and endpoints from the environment.
    ///
    /// `lookup` is `std::env::var` in production; tests pass a map.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for key in ["DATABASE_URL", "MONGO_URL"] {
            let Some(url) = lookup(key) else { continue };
            if url.starts_with("sqlite:") {
                self.database.url = url;
                break;
            }
            // Connection strings for other stores are left to their own tooling
            warn!(variable = key, "Ignoring non-SQLite database URL");
        }
        if let Some(key) = lookup("S3_ACCESS_KEY") {
            self.storage.access_key_id = Some(key);
        }
        if let Some(secret) = lookup("S3_SECRET_ACCESS_KEY") {
            self.storage.secret_access_key = Some(secret);
        }
        if let Some(region) = lookup("S3_REGION") {
            self.storage.region = region;
        }
        if let Some(bucket) = lookup("S3_BUCKET") {
            self.storage.bucket = bucket;
        }
        match lookup("JWT_SECRET") {
            Some(secret) if !secret.is_empty() => self.auth.jwt_secret = secret,
            _ => {}
        }
    }

    /// Spool directory for uploads in flight
    pub fn upload_temp_dir(&self) -> PathBuf {
        self.upload
            .temp_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    pub fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            storage: StorageConfig::default(),
            upload: UploadConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Log settings that are legal but likely unintended
    pub fn warn_on_weak_settings(&self) {
        if self.auth.salt_policy == SaltPolicy::Process {
            warn!("auth.salt_policy = \"process\": every password is hashed with the same salt");
        }
        if self.upload.concurrency == 0 {
            warn!("upload.concurrency is 0, falling back to sequential uploads");
        }
    }
}
