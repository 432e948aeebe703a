//! Credential primitives: password hashing and stateless session tokens.
//!
//! Both components are built once from [`crate::config::AuthConfig`] and
//! shared read-only through [`crate::AppState`].

mod password;
mod session;

pub use password::{PasswordError, PasswordHasher, SaltPolicy};
pub use session::{SessionClaims, SessionSigner, TokenError};
