//! Stateless session tokens.
//!
//! Tokens are HS256 JWTs carrying `{email, id}` with no expiry claim. Nothing
//! is stored server-side; a token stays valid until the signing secret changes.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Identity asserted by a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub email: String,
    pub id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("no session token presented")]
    Missing,
    #[error("invalid session token: {0}")]
    Signature(#[source] jsonwebtoken::errors::Error),
    #[error("failed to sign session token: {0}")]
    Issue(#[source] jsonwebtoken::errors::Error),
}

pub struct SessionSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl SessionSigner {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn issue(&self, claims: &SessionClaims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding).map_err(TokenError::Issue)
    }

    /// Check the signature and return the embedded claims unchanged
    pub fn verify(&self, token: &str) -> Result<SessionClaims, TokenError> {
        if token.is_empty() {
            return Err(TokenError::Missing);
        }
        decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(TokenError::Signature)
    }
}
