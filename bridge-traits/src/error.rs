//! Bridge error taxonomy.
//!
//! Host adapters report failures through these variants; the upload core
//! maps them into its per-stage error type and never matches on the
//! transport details.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    /// The host provides no implementation for the requested operation.
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    /// The backend understood the request and rejected it.
    #[error("Remote API rejected the request: {0}")]
    Api(String),

    /// The request never produced a backend answer.
    #[error("Network error: {0}")]
    Network(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
