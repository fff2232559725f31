//! # Draft Listing Handle
//!
//! Lazily creates the remote draft listing exactly once per session.
//!
//! ## Overview
//!
//! Uploaded images are linked to a draft listing that only materializes on
//! the server when the seller first attaches a file. `DraftHandle` owns
//! that lifecycle: the first `ensure` call invokes
//! [`ListingMediaApi::create_draft`] and caches the id; every later call
//! returns the cached id.
//!
//! The cell's async mutex is held across the remote call, so concurrent
//! `ensure` calls are serialized: racing submissions await the same
//! in-flight creation instead of creating a second draft and silently
//! discarding one id.

use std::sync::Arc;

use bridge_traits::api::{DraftId, ListingMediaApi};
use core_runtime::events::{CoreEvent, DraftEvent, EventBus};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{Result, UploadError};

/// Lazily-initialized handle to the session's draft listing.
pub struct DraftHandle {
    api: Arc<dyn ListingMediaApi>,
    events: EventBus,
    cell: Mutex<Option<DraftId>>,
}

impl DraftHandle {
    /// Create an uninitialized handle.
    pub fn new(api: Arc<dyn ListingMediaApi>, events: EventBus) -> Self {
        Self {
            api,
            events,
            cell: Mutex::new(None),
        }
    }

    /// Return the draft id, creating the draft on first use.
    ///
    /// # Errors
    ///
    /// Returns `DraftInit` when creation fails; nothing is cached and the
    /// next call retries.
    pub async fn ensure(&self) -> Result<DraftId> {
        let mut cell = self.cell.lock().await;

        if let Some(id) = cell.as_ref() {
            return Ok(id.clone());
        }

        let id = self.api.create_draft().await.map_err(|e| {
            warn!(error = %e, "Draft listing creation failed");
            UploadError::DraftInit(e.to_string())
        })?;

        info!(draft_id = %id, "Draft listing created");
        *cell = Some(id.clone());

        self.events
            .emit(CoreEvent::Draft(DraftEvent::Created {
                draft_id: id.to_string(),
            }))
            .ok();

        Ok(id)
    }

    /// Return the cached draft id without initiating creation.
    pub async fn peek(&self) -> Option<DraftId> {
        self.cell.lock().await.clone()
    }
}
