//! # File Entry State Machine
//!
//! Per-file upload state, owned by the manager and observed by the UI.
//!
//! ## State Machine
//!
//! ```text
//! Pending → Uploading → Completed
//!     ↓          ↓
//! (removed)    Error
//! ```
//!
//! Transitions are monotonic: `Completed` and `Error` are terminal, and a
//! `Pending` entry can only leave the machine by admission or removal.
//! There is no retry transition; a failed file is removed and resubmitted.

use bridge_traits::preview::{PreviewHandle, PreviewId};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Result, UploadError};

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for an upload entry, generated client-side and stable
/// for the entry's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(Uuid);

impl EntryId {
    /// Create a new random entry ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Status Types
// ============================================================================

/// The current status of an upload entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Entry is queued and waiting for a concurrency slot
    Pending,
    /// Entry is running the authorize/transfer/link pipeline
    Uploading,
    /// All pipeline stages succeeded
    Completed,
    /// A pipeline stage failed or timed out
    Error,
}

impl EntryStatus {
    /// Check if this status represents a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, EntryStatus::Completed | EntryStatus::Error)
    }

    /// Check if this status represents an active state
    pub fn is_active(&self) -> bool {
        matches!(self, EntryStatus::Pending | EntryStatus::Uploading)
    }

    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Pending => "pending",
            EntryStatus::Uploading => "uploading",
            EntryStatus::Completed => "completed",
            EntryStatus::Error => "error",
        }
    }
}

impl FromStr for EntryStatus {
    type Err = UploadError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(EntryStatus::Pending),
            "uploading" => Ok(EntryStatus::Uploading),
            "completed" => Ok(EntryStatus::Completed),
            "error" => Ok(EntryStatus::Error),
            _ => Err(UploadError::InvalidStatus(s.to_string())),
        }
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Raw Input
// ============================================================================

/// A file as selected by the seller, before preprocessing.
#[derive(Debug, Clone)]
pub struct RawFile {
    /// Original file name
    pub name: String,
    /// MIME type reported by the host
    pub content_type: String,
    /// File contents
    pub bytes: Bytes,
}

impl RawFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Bytes) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }
}

// ============================================================================
// File Entry
// ============================================================================

/// One file's journey through the upload pipeline.
///
/// Owned exclusively by the upload manager; observers see [`EntrySnapshot`]
/// copies. The preview handle is taken out exactly once, on removal or
/// manager teardown.
#[derive(Debug)]
pub struct FileEntry {
    /// Unique identifier
    pub id: EntryId,
    /// The raw input as selected by the seller; immutable
    pub original: RawFile,
    /// The artifact actually transferred (preprocessed, or the original
    /// bytes when preprocessing fell back)
    pub upload_artifact: Bytes,
    /// Current status
    pub status: EntryStatus,
    /// Informational progress, 0 on admission and 100 on completion
    pub progress: u8,
    /// Remote name assigned by the Authorize stage
    pub remote_name: Option<String>,
    /// Failure cause, present only in `Error`
    pub error_message: Option<String>,
    /// Unix timestamp when the entry was created
    pub created_at: i64,

    preview: Option<PreviewHandle>,
}

impl FileEntry {
    /// Create a new pending entry.
    pub fn new(original: RawFile, upload_artifact: Bytes, preview: PreviewHandle) -> Self {
        Self {
            id: EntryId::new(),
            original,
            upload_artifact,
            status: EntryStatus::Pending,
            progress: 0,
            remote_name: None,
            error_message: None,
            created_at: chrono::Utc::now().timestamp(),
            preview: Some(preview),
        }
    }

    /// The preview id for display, if the handle has not been released.
    pub fn preview_id(&self) -> Option<PreviewId> {
        self.preview.as_ref().map(|p| p.id())
    }

    /// Take ownership of the preview handle for release.
    ///
    /// Returns `None` if it was already taken; the handle therefore reaches
    /// the preview store at most once.
    pub(crate) fn take_preview(&mut self) -> Option<PreviewHandle> {
        self.preview.take()
    }

    /// Admit the entry into the pipeline.
    pub(crate) fn admit(&mut self) -> Result<()> {
        self.transition(EntryStatus::Pending, EntryStatus::Uploading)?;
        self.progress = 0;
        Ok(())
    }

    /// Mark the entry completed with the confirmed stored name.
    pub(crate) fn complete(&mut self, remote_name: String) -> Result<()> {
        self.transition(EntryStatus::Uploading, EntryStatus::Completed)?;
        self.remote_name = Some(remote_name);
        self.progress = 100;
        Ok(())
    }

    /// Mark the entry failed with a human-readable cause.
    pub(crate) fn fail(&mut self, message: String) -> Result<()> {
        self.transition(EntryStatus::Uploading, EntryStatus::Error)?;
        self.error_message = Some(message);
        Ok(())
    }

    fn transition(&mut self, from: EntryStatus, to: EntryStatus) -> Result<()> {
        if self.status != from {
            return Err(UploadError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Copy the observable state for the UI layer.
    pub fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            id: self.id,
            file_name: self.original.name.clone(),
            status: self.status,
            progress: self.progress,
            preview: self.preview_id(),
            remote_name: self.remote_name.clone(),
            error_message: self.error_message.clone(),
        }
    }
}

/// Observable per-entry state handed to the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntrySnapshot {
    pub id: EntryId,
    pub file_name: String,
    pub status: EntryStatus,
    pub progress: u8,
    pub preview: Option<PreviewId>,
    pub remote_name: Option<String>,
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::preview::PreviewId;

    fn test_entry() -> FileEntry {
        let raw = RawFile::new("chair.jpg", "image/jpeg", Bytes::from_static(b"raw"));
        let artifact = raw.bytes.clone();
        FileEntry::new(raw, artifact, PreviewHandle::new(PreviewId::new()))
    }

    #[test]
    fn test_entry_ids_unique() {
        assert_ne!(test_entry().id, test_entry().id);
    }

    #[test]
    fn test_entry_id_displays_as_uuid() {
        let id = EntryId::new();
        let rendered = id.to_string();
        assert_eq!(rendered.len(), 36);
        assert_eq!(rendered, format!("{id}"));
    }

    #[test]
    fn test_status_round_trip() {
        assert_eq!(EntryStatus::Uploading.as_str(), "uploading");
        assert_eq!("uploading".parse::<EntryStatus>().unwrap(), EntryStatus::Uploading);
        assert!(EntryStatus::Completed.is_terminal());
        assert!(EntryStatus::Error.is_terminal());
        assert!(EntryStatus::Pending.is_active());
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut entry = test_entry();
        assert_eq!(entry.status, EntryStatus::Pending);

        entry.admit().unwrap();
        assert_eq!(entry.status, EntryStatus::Uploading);
        assert_eq!(entry.progress, 0);

        entry.complete("media/abc.jpg".to_string()).unwrap();
        assert_eq!(entry.status, EntryStatus::Completed);
        assert_eq!(entry.progress, 100);
        assert_eq!(entry.remote_name.as_deref(), Some("media/abc.jpg"));
    }

    #[test]
    fn test_failure_transition() {
        let mut entry = test_entry();
        entry.admit().unwrap();
        entry.fail("Transfer stage failed: connection reset".to_string()).unwrap();

        assert_eq!(entry.status, EntryStatus::Error);
        assert!(entry.error_message.as_deref().unwrap().contains("Transfer"));
    }

    #[test]
    fn test_terminal_states_do_not_regress() {
        let mut entry = test_entry();
        entry.admit().unwrap();
        entry.complete("media/abc.jpg".to_string()).unwrap();

        assert!(entry.fail("late failure".to_string()).is_err());
        assert_eq!(entry.status, EntryStatus::Completed);

        let mut failed = test_entry();
        failed.admit().unwrap();
        failed.fail("boom".to_string()).unwrap();

        assert!(failed.complete("media/x.jpg".to_string()).is_err());
        assert_eq!(failed.status, EntryStatus::Error);
    }

    #[test]
    fn test_cannot_complete_without_admission() {
        let mut entry = test_entry();
        let err = entry.complete("media/abc.jpg".to_string()).unwrap_err();
        assert!(matches!(err, UploadError::InvalidTransition { .. }));
    }

    #[test]
    fn test_preview_taken_once() {
        let mut entry = test_entry();
        assert!(entry.preview_id().is_some());

        assert!(entry.take_preview().is_some());
        assert!(entry.take_preview().is_none());
        assert!(entry.preview_id().is_none());
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let mut entry = test_entry();
        entry.admit().unwrap();
        entry.fail("Link stage timed out after 15s".to_string()).unwrap();

        let snap = entry.snapshot();
        assert_eq!(snap.id, entry.id);
        assert_eq!(snap.file_name, "chair.jpg");
        assert_eq!(snap.status, EntryStatus::Error);
        assert!(snap.error_message.unwrap().contains("timed out"));
    }
}
