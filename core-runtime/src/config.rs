//! # Core Configuration Module
//!
//! Configuration and dependency wiring for the storefront core.
//!
//! ## Overview
//!
//! The configuration system uses a builder to construct a [`CoreConfig`]
//! holding the bridge trait objects the core requires. Validation is
//! fail-fast: missing bridges produce an actionable `CapabilityMissing`
//! error at build time rather than a panic deep inside the pipeline.
//!
//! ## Required Dependencies
//!
//! - `ListingMediaApi` - backend operations for the upload pipeline
//! - `PreviewStore` - allocation/release of preview display handles
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .api(Arc::new(HttpListingMediaApi::new(base_url)))
//!     .preview_store(Arc::new(NativePreviewStore::new()))
//!     .event_buffer(100)
//!     .build()
//!     .expect("Failed to build config");
//! ```

use std::sync::Arc;

use bridge_traits::{ListingMediaApi, PreviewStore};

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;

/// Core configuration for the storefront upload core.
///
/// Use [`CoreConfig::builder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Backend API for draft creation and the upload pipeline (required)
    pub api: Arc<dyn ListingMediaApi>,

    /// Preview display handle store (required)
    pub preview_store: Arc<dyn PreviewStore>,

    /// Buffer size for the core event bus
    pub event_buffer: usize,
}

impl CoreConfig {
    /// Create a new configuration builder.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("event_buffer", &self.event_buffer)
            .finish_non_exhaustive()
    }
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    api: Option<Arc<dyn ListingMediaApi>>,
    preview_store: Option<Arc<dyn PreviewStore>>,
    event_buffer: Option<usize>,
}

impl CoreConfigBuilder {
    /// Set the backend API implementation.
    pub fn api(mut self, api: Arc<dyn ListingMediaApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// Set the preview store implementation.
    pub fn preview_store(mut self, store: Arc<dyn PreviewStore>) -> Self {
        self.preview_store = Some(store);
        self
    }

    /// Set the event bus buffer size.
    pub fn event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = Some(capacity);
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns `CapabilityMissing` when a required bridge was not provided,
    /// `Config` when a provided value is invalid.
    pub fn build(self) -> Result<CoreConfig> {
        let api = self.api.ok_or_else(|| Error::CapabilityMissing {
            capability: "ListingMediaApi".to_string(),
            message: "No backend API implementation provided. \
                      Inject the host's adapter before building the config."
                .to_string(),
        })?;

        let preview_store = self.preview_store.ok_or_else(|| Error::CapabilityMissing {
            capability: "PreviewStore".to_string(),
            message: "No preview store implementation provided. \
                      Inject the host's adapter before building the config."
                .to_string(),
        })?;

        let event_buffer = self.event_buffer.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE);
        if event_buffer == 0 {
            return Err(Error::Config(
                "event_buffer must be greater than zero".to_string(),
            ));
        }

        Ok(CoreConfig {
            api,
            preview_store,
            event_buffer,
        })
    }
}
