//! Database models split into domain-specific modules.

pub mod report;
pub mod user;

pub use report::*;
pub use user::*;
