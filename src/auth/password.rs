use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
    },
    Argon2,
};
use serde::Deserialize;

/// How salts are chosen when hashing passwords.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SaltPolicy {
    /// A fresh random salt for every hash
    #[default]
    PerHash,
    /// One salt generated at startup and reused for every hash.
    /// Identical passwords produce identical digests under this policy.
    Process,
}

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("failed to hash password: {0}")]
    Hash(String),
}

/// Argon2 password hasher with an explicit salt policy
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    process_salt: Option<SaltString>,
}

impl PasswordHasher {
    pub fn new(policy: SaltPolicy) -> Self {
        let process_salt = match policy {
            SaltPolicy::PerHash => None,
            SaltPolicy::Process => Some(SaltString::generate(&mut OsRng)),
        };
        Self {
            argon2: Argon2::default(),
            process_salt,
        }
    }

    /// Hash a password into a PHC string
    pub fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        let fresh;
        let salt = match &self.process_salt {
            Some(salt) => salt,
            None => {
                fresh = SaltString::generate(&mut OsRng);
                &fresh
            }
        };

        self.argon2
            .hash_password(plaintext.as_bytes(), salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PasswordError::Hash(e.to_string()))
    }

    /// Verify a password against a stored digest.
    ///
    /// Malformed digests verify as `false`.
    pub fn verify(&self, plaintext: &str, digest: &str) -> bool {
        let parsed = match PasswordHash::new(digest) {
            Ok(h) => h,
            Err(_) => return false,
        };
        self.argon2
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }
}
