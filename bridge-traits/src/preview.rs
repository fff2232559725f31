//! Preview Handle Abstraction
//!
//! Uploaded files are shown to the seller while the transfer runs. The
//! display handle for that preview (an object URL in a browser host, a
//! temp-file path on desktop) is a resource the host allocates and the core
//! must hand back exactly once.
//!
//! `PreviewHandle` is deliberately not `Clone`: releasing consumes the
//! handle, so a double release does not compile.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of an allocated preview, safe to copy into snapshots
/// handed to the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PreviewId(Uuid);

impl PreviewId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PreviewId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PreviewId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Owned handle to a host-allocated preview resource.
#[derive(Debug, PartialEq, Eq)]
pub struct PreviewHandle {
    id: PreviewId,
}

impl PreviewHandle {
    pub fn new(id: PreviewId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> PreviewId {
        self.id
    }
}

/// Host-side allocation and release of preview resources.
///
/// Allocation is synchronous because the underlying host call is (the
/// browser's object-URL pair being the reference behavior). Implementations
/// must tolerate `release` being called while the previewed upload is still
/// in flight; the upload does not borrow the preview.
pub trait PreviewStore: Send + Sync {
    /// Allocate a display handle for the given original bytes.
    fn allocate(&self, bytes: &Bytes) -> PreviewHandle;

    /// Release a previously allocated handle.
    ///
    /// Consumes the handle; the core guarantees each handle reaches this
    /// method at most once (on entry removal or manager teardown).
    fn release(&self, handle: PreviewHandle);
}
