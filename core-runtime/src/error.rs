//! Runtime error taxonomy.
//!
//! Everything that can go wrong before the upload core is wired up:
//! invalid configuration values and missing bridge capabilities. Domain
//! failures (draft creation, stage errors) live in the domain crate's own
//! error type.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A configuration value was rejected during validation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required bridge implementation was not injected.
    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
