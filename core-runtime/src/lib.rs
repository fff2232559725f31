//! # Storefront Core Runtime
//!
//! Runtime services shared by the storefront core crates.
//!
//! ## Overview
//!
//! This crate provides the infrastructure the domain crates build on:
//!
//! - **Configuration** (`config`): builder wiring bridge implementations
//!   with fail-fast validation
//! - **Events** (`events`): typed broadcast event bus connecting the core
//!   to its observers
//! - **Logging** (`logging`): `tracing` initialization and redaction
//!   helpers

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder};
pub use error::{Error, Result};
pub use events::{
    CoreEvent, DraftEvent, EventBus, EventSeverity, EventStream, UploadEvent,
};
pub use logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
