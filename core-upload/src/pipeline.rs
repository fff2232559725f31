//! # Pipeline Stages
//!
//! The three ordered remote operations an admitted entry passes through,
//! each raced against its own deadline.
//!
//! ## Overview
//!
//! An entry's run is Authorize → Transfer → Link, strictly in order; a
//! failure or timeout at any stage marks the entry failed and skips the
//! remaining stages. Timeouts are per-stage, not per-entry: Transfer gets a
//! larger bound because it moves the bulk data.
//!
//! Timing out drops the stage future. Whatever the remote side eventually
//! does with the request is deliberately ignored; there is no late
//! settlement to observe.

use std::time::Duration;

use bridge_traits::api::{DraftId, ListingMediaApi};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, UploadError};

/// One of the three ordered remote operations of an entry's run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// Request a one-time upload credential and remote name
    Authorize,
    /// Send the artifact bytes to the storage endpoint
    Transfer,
    /// Attach the stored asset to the draft listing
    Link,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Authorize => "Authorize",
            Stage::Transfer => "Transfer",
            Stage::Link => "Link",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-stage deadlines.
#[derive(Debug, Clone)]
pub struct StageTimeouts {
    pub authorize: Duration,
    pub transfer: Duration,
    pub link: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            authorize: Duration::from_secs(15),
            // The bulk data transfer gets the largest bound
            transfer: Duration::from_secs(45),
            link: Duration::from_secs(15),
        }
    }
}

impl StageTimeouts {
    fn bound(&self, stage: Stage) -> Duration {
        match stage {
            Stage::Authorize => self.authorize,
            Stage::Transfer => self.transfer,
            Stage::Link => self.link,
        }
    }
}

/// Run the full stage sequence for one artifact against the draft listing.
///
/// Returns the stored remote name on success. The caller (the manager's
/// spawned run) converts the error into the entry's terminal state.
pub(crate) async fn run_stages(
    api: &dyn ListingMediaApi,
    timeouts: &StageTimeouts,
    artifact: Bytes,
    draft: &DraftId,
) -> Result<String> {
    let grant = bounded(Stage::Authorize, timeouts, api.authorize_upload()).await?;
    debug!(remote_name = %grant.remote_name, "Upload authorized");

    let stored = bounded(Stage::Transfer, timeouts, api.transfer(artifact, &grant)).await?;

    bounded(
        Stage::Link,
        timeouts,
        api.link_media(draft, std::slice::from_ref(&stored)),
    )
    .await?;

    Ok(stored)
}

/// Race one stage call against its deadline.
async fn bounded<T>(
    stage: Stage,
    timeouts: &StageTimeouts,
    call: impl std::future::Future<Output = bridge_traits::error::Result<T>>,
) -> Result<T> {
    let limit = timeouts.bound(stage);
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(UploadError::StageFailed {
            stage,
            message: err.to_string(),
        }),
        Err(_) => Err(UploadError::StageTimeout {
            stage,
            timeout_secs: limit.as_secs(),
        }),
    }
}
