//! Listing Media API Abstraction
//!
//! Defines the contract between the upload core and the storefront backend.
//! The transport (HTTP client, endpoints, authentication headers) lives in a
//! host-specific adapter crate; the core only depends on this trait.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Identifier of a draft listing on the server.
///
/// `None`-ness is never represented here; callers that have not yet created
/// a draft simply hold no `DraftId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DraftId(String);

impl DraftId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DraftId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One-time upload authorization issued by the backend.
///
/// The `remote_name` is assigned by the server and identifies the asset in
/// all subsequent stages; the `credential` authorizes exactly one transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadGrant {
    pub credential: String,
    pub remote_name: String,
}

/// Remote operations consumed by the upload pipeline.
///
/// Each method maps to one backend call:
/// - `create_draft` materializes the draft listing that uploaded images are
///   attached to. The core calls this at most once per manager session.
/// - `authorize_upload` requests a one-time credential and an assigned
///   remote name for a single file.
/// - `transfer` sends the artifact bytes to the storage endpoint and returns
///   the confirmed stored name.
/// - `link_media` associates transferred assets with the draft listing.
///
/// Implementations must be safe to call concurrently; the core bounds the
/// number of in-flight calls itself.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::api::ListingMediaApi;
///
/// async fn upload_one(api: &dyn ListingMediaApi, bytes: bytes::Bytes) -> bridge_traits::error::Result<()> {
///     let draft = api.create_draft().await?;
///     let grant = api.authorize_upload().await?;
///     let stored = api.transfer(bytes, &grant).await?;
///     api.link_media(&draft, &[stored]).await
/// }
/// ```
#[async_trait]
pub trait ListingMediaApi: Send + Sync {
    /// Create the draft listing that uploads will be linked to.
    ///
    /// Not guaranteed idempotent by the backend; callers must not invoke it
    /// twice for the same session.
    async fn create_draft(&self) -> Result<DraftId>;

    /// Request a one-time upload credential and assigned remote name.
    async fn authorize_upload(&self) -> Result<UploadGrant>;

    /// Transfer the artifact to storage under the granted name.
    ///
    /// Returns the stored name confirmed by the endpoint.
    async fn transfer(&self, artifact: Bytes, grant: &UploadGrant) -> Result<String>;

    /// Attach previously transferred assets to the draft listing.
    async fn link_media(&self, draft: &DraftId, remote_names: &[String]) -> Result<()>;
}
