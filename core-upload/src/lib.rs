//! # Listing Media Upload Module
//!
//! Drives a seller's listing photos from file selection to linked media on
//! the draft listing.
//!
//! ## Overview
//!
//! This module manages the lifecycle of a listing's upload session,
//! including:
//! - Lazily creating the draft listing on first submission via
//!   `ListingMediaApi`
//! - Preprocessing selected images (downscale and recompress, best-effort)
//! - Allocating a preview handle per file via `PreviewStore`
//! - Running each file through Authorize → Transfer → Link under a fixed
//!   concurrency ceiling with per-stage timeouts
//! - Tracking per-file state and announcing every change on the event bus
//!
//! ## Components
//!
//! - **File Entry State Machine** (`entry`): Per-file status with validated
//!   monotonic transitions
//! - **Draft Handle** (`draft`): Once-only lazy creation of the draft listing
//! - **Preprocessor** (`preprocess`): Best-effort image recompression
//! - **Pipeline Stages** (`pipeline`): The ordered remote stages and their
//!   deadlines
//! - **Upload Manager** (`manager`): Queue, admission, settlement, teardown

pub mod draft;
pub mod entry;
pub mod error;
pub mod manager;
pub mod pipeline;
pub mod preprocess;

pub use draft::DraftHandle;
pub use entry::{EntryId, EntrySnapshot, EntryStatus, FileEntry, RawFile};
pub use error::{Result, UploadError};
pub use manager::{UploadConfig, UploadManager};
pub use pipeline::{Stage, StageTimeouts};
pub use preprocess::{PreprocessConfig, Preprocessor};
