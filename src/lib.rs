pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod storage;

pub use db::DbPool;

use anyhow::Result;
use config::Config;
use std::sync::Arc;

use crate::auth::{PasswordHasher, SessionSigner};
use crate::storage::{ObjectStore, UploadGateway};

/// Shared, read-only request state built once at startup
pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub passwords: PasswordHasher,
    pub sessions: SessionSigner,
    pub uploads: UploadGateway,
}

impl AppState {
    pub fn new(config: Config, db: DbPool, store: Arc<dyn ObjectStore>) -> Result<Self> {
        let passwords = PasswordHasher::new(config.auth.salt_policy);
        let sessions = SessionSigner::new(&config.auth.jwt_secret);
        let uploads = UploadGateway::new(store, &config)?;
        Ok(Self {
            config,
            db,
            passwords,
            sessions,
            uploads,
        })
    }
}
