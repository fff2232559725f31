//! # Upload Queue Manager
//!
//! Owns the set of upload entries and drives them through the pipeline
//! under a fixed concurrency ceiling.
//!
//! ## Overview
//!
//! The manager is the only writer of upload state. Callers submit raw
//! files and remove entries; everything else (admission, the stage runs,
//! settlement) happens inside. Observers subscribe to the event bus and
//! re-read `entries()` on `EntriesChanged`.
//!
//! ## Workflow
//!
//! 1. `submit` ensures the draft listing exists (aborting the whole call,
//!    with no entries created, if creation fails)
//! 2. each file is preprocessed, given a preview handle, and queued as a
//!    `Pending` entry
//! 3. `drain` admits pending entries FIFO while a concurrency slot is free,
//!    spawning one pipeline run per admission
//! 4. a settling run records the terminal state, frees its slot, and drains
//!    again
//!
//! `drain` is additionally invoked from a periodic tick. The tick is a
//! safety net for missed event-driven triggers, not the primary scheduler;
//! it is stopped by `shutdown`.
//!
//! ## Usage
//!
//! ```ignore
//! use core_upload::{UploadConfig, UploadManager};
//!
//! # async fn example(core: &core_runtime::CoreConfig) -> core_upload::Result<()> {
//! let manager = UploadManager::from_config(core, UploadConfig::default());
//! let mut events = manager.events().subscribe();
//!
//! manager.submit(vec![raw_file]).await?;
//!
//! while let Ok(event) = events.recv().await {
//!     let snapshot = manager.entries().await;
//!     // render snapshot
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use bridge_traits::api::ListingMediaApi;
use bridge_traits::preview::PreviewStore;
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, UploadEvent};
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::draft::DraftHandle;
use crate::entry::{EntryId, EntrySnapshot, EntryStatus, FileEntry, RawFile};
use crate::error::Result;
use crate::pipeline::{self, StageTimeouts};
use crate::preprocess::{PreprocessConfig, Preprocessor};

/// Upload manager configuration
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Maximum number of entries in the `Uploading` state at once
    pub max_concurrent_uploads: usize,

    /// Period of the safety-net drain tick
    pub drain_interval: Duration,

    /// Per-stage deadlines
    pub timeouts: StageTimeouts,

    /// Image preprocessing settings
    pub preprocess: PreprocessConfig,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_concurrent_uploads: 3,
            drain_interval: Duration::from_millis(500),
            timeouts: StageTimeouts::default(),
            preprocess: PreprocessConfig::default(),
        }
    }
}

/// All mutable queue state, guarded by one lock.
///
/// The lock is never held across a stage await; pipeline runs re-acquire it
/// only to settle.
struct QueueState {
    /// Caller-visible entries, in submission order
    entries: Vec<FileEntry>,
    /// Ids awaiting admission, FIFO
    pending: VecDeque<EntryId>,
    /// Entries currently running the pipeline
    in_flight: usize,
}

struct Inner {
    config: UploadConfig,
    api: Arc<dyn ListingMediaApi>,
    previews: Arc<dyn PreviewStore>,
    preprocessor: Preprocessor,
    draft: DraftHandle,
    events: EventBus,
    state: Mutex<QueueState>,
    shutdown: CancellationToken,
}

/// Upload queue manager.
///
/// Cheap to clone; clones share the same queue. Distinct managers share
/// nothing, so independent upload sessions cannot interfere.
#[derive(Clone)]
pub struct UploadManager {
    inner: Arc<Inner>,
}

impl UploadManager {
    /// Create a manager and start its safety-net drain tick.
    pub fn new(
        config: UploadConfig,
        api: Arc<dyn ListingMediaApi>,
        previews: Arc<dyn PreviewStore>,
        events: EventBus,
    ) -> Self {
        let manager = Self {
            inner: Arc::new(Inner {
                draft: DraftHandle::new(api.clone(), events.clone()),
                preprocessor: Preprocessor::new(config.preprocess.clone()),
                config,
                api,
                previews,
                events,
                state: Mutex::new(QueueState {
                    entries: Vec::new(),
                    pending: VecDeque::new(),
                    in_flight: 0,
                }),
                shutdown: CancellationToken::new(),
            }),
        };
        manager.spawn_drain_tick();
        manager
    }

    /// Create a manager from a validated core configuration.
    pub fn from_config(core: &CoreConfig, config: UploadConfig) -> Self {
        Self::new(
            config,
            core.api.clone(),
            core.preview_store.clone(),
            EventBus::new(core.event_buffer),
        )
    }

    /// The bus this manager announces state changes on.
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Submit raw files for upload.
    ///
    /// Ensures the draft listing exists first; when creation fails, the
    /// call returns `DraftInit` and creates no entries (entries from
    /// earlier calls are unaffected). Each file is preprocessed
    /// (best-effort), given a preview handle, and queued `Pending`; the
    /// queue is then drained.
    ///
    /// Returns the ids of the created entries in submission order.
    #[instrument(skip(self, raw_files), fields(file_count = raw_files.len()))]
    pub async fn submit(&self, raw_files: Vec<RawFile>) -> Result<Vec<EntryId>> {
        if raw_files.is_empty() {
            return Ok(Vec::new());
        }

        // Draft first: nothing is queued against a listing that does not exist.
        self.inner.draft.ensure().await?;

        // Recompression is CPU-bound; prepare the entries before touching
        // the queue so drains and views are not stalled behind it.
        let prepared: Vec<FileEntry> = raw_files
            .into_iter()
            .map(|raw| {
                let artifact = self.inner.preprocessor.prepare(&raw);
                let preview = self.inner.previews.allocate(&raw.bytes);
                FileEntry::new(raw, artifact, preview)
            })
            .collect();

        let mut ids = Vec::with_capacity(prepared.len());
        {
            let mut state = self.inner.state.lock().await;
            for entry in prepared {
                debug!(entry_id = %entry.id, file = %entry.original.name, "Entry queued");
                ids.push(entry.id);
                state.pending.push_back(entry.id);
                state.entries.push(entry);
            }
        }

        self.emit_entries_changed();
        self.drain().await;
        Ok(ids)
    }

    /// Remove an entry.
    ///
    /// Drops it from the visible list and the pending queue, and releases
    /// its preview handle. An already-admitted pipeline run is not aborted:
    /// it keeps running against the backend, and its settlement is
    /// discarded because the entry is gone.
    #[instrument(skip(self), fields(entry_id = %id))]
    pub async fn remove(&self, id: EntryId) {
        let released = {
            let mut state = self.inner.state.lock().await;
            state.pending.retain(|pending| *pending != id);

            match state.entries.iter().position(|entry| entry.id == id) {
                Some(pos) => {
                    let mut entry = state.entries.remove(pos);
                    if entry.status == EntryStatus::Uploading {
                        debug!("Removed entry is in flight; its settlement will be discarded");
                    }
                    entry.take_preview()
                }
                None => None,
            }
        };

        if let Some(handle) = released {
            self.inner.previews.release(handle);
        }
        self.emit_entries_changed();
    }

    /// Admit pending entries while a concurrency slot is free.
    ///
    /// Re-entrant-safe: invoked after `submit`, after every settlement,
    /// and from the periodic tick. Returns immediately after scheduling
    /// the admitted runs; it never waits for a stage.
    pub async fn drain(&self) {
        // No stage may run until the draft listing exists.
        let Some(draft) = self.inner.draft.peek().await else {
            return;
        };

        let mut admitted = Vec::new();
        {
            let mut state = self.inner.state.lock().await;
            while state.in_flight < self.inner.config.max_concurrent_uploads {
                let Some(id) = state.pending.pop_front() else {
                    break;
                };
                // The id may have been removed while pending
                let Some(entry) = state.entries.iter_mut().find(|entry| entry.id == id) else {
                    continue;
                };
                if let Err(err) = entry.admit() {
                    error!(entry_id = %id, error = %err, "Skipping entry with unexpected status");
                    continue;
                }
                let artifact = entry.upload_artifact.clone();
                state.in_flight += 1;
                admitted.push((id, artifact));
            }
        }

        if admitted.is_empty() {
            return;
        }

        for (id, artifact) in admitted {
            info!(entry_id = %id, "Entry admitted to upload pipeline");
            self.inner
                .events
                .emit(CoreEvent::Upload(UploadEvent::EntryAdmitted {
                    entry_id: id.to_string(),
                }))
                .ok();

            let manager = self.clone();
            let draft = draft.clone();
            tokio::spawn(async move {
                let outcome = pipeline::run_stages(
                    manager.inner.api.as_ref(),
                    &manager.inner.config.timeouts,
                    artifact,
                    &draft,
                )
                .await;
                manager.settle(id, outcome).await;
            });
        }

        self.emit_entries_changed();
    }

    /// Record a finished pipeline run, free its slot, and drain again.
    ///
    /// Boxed to break the recursive `drain -> settle -> drain` Send cycle.
    fn settle<'a>(
        &'a self,
        id: EntryId,
        outcome: Result<String>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
        let event = {
            let mut state = self.inner.state.lock().await;
            state.in_flight -= 1;

            match state.entries.iter_mut().find(|entry| entry.id == id) {
                Some(entry) => match outcome {
                    Ok(remote_name) => match entry.complete(remote_name.clone()) {
                        Ok(()) => {
                            info!(entry_id = %id, remote_name = %remote_name, "Entry completed");
                            Some(UploadEvent::EntryCompleted {
                                entry_id: id.to_string(),
                                remote_name,
                            })
                        }
                        Err(err) => {
                            error!(entry_id = %id, error = %err, "Discarding settlement");
                            None
                        }
                    },
                    Err(cause) => {
                        let message = cause.to_string();
                        match entry.fail(message.clone()) {
                            Ok(()) => {
                                warn!(entry_id = %id, error = %message, "Entry failed");
                                Some(UploadEvent::EntryFailed {
                                    entry_id: id.to_string(),
                                    message,
                                })
                            }
                            Err(err) => {
                                error!(entry_id = %id, error = %err, "Discarding settlement");
                                None
                            }
                        }
                    }
                },
                None => {
                    // Removed while in flight; the result is discarded.
                    debug!(entry_id = %id, "Settled entry is no longer visible");
                    None
                }
            }
        };

        if let Some(event) = event {
            self.inner.events.emit(CoreEvent::Upload(event)).ok();
            self.emit_entries_changed();
        }

        self.drain().await;
        })
    }

    /// Snapshot of the caller-visible entries, in submission order.
    pub async fn entries(&self) -> Vec<EntrySnapshot> {
        let state = self.inner.state.lock().await;
        state.entries.iter().map(FileEntry::snapshot).collect()
    }

    /// True iff the visible list is non-empty and every entry completed.
    pub async fn all_completed(&self) -> bool {
        let state = self.inner.state.lock().await;
        !state.entries.is_empty()
            && state
                .entries
                .iter()
                .all(|entry| entry.status == EntryStatus::Completed)
    }

    /// True iff any visible entry is in the error state.
    pub async fn has_error(&self) -> bool {
        let state = self.inner.state.lock().await;
        state
            .entries
            .iter()
            .any(|entry| entry.status == EntryStatus::Error)
    }

    /// Count of visible entries not yet in a terminal state.
    pub async fn active_count(&self) -> usize {
        let state = self.inner.state.lock().await;
        state
            .entries
            .iter()
            .filter(|entry| entry.status.is_active())
            .count()
    }

    /// Stop the drain tick and release every live preview handle.
    ///
    /// In-flight runs are left to settle against removed entries; their
    /// results are discarded.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();

        let handles: Vec<_> = {
            let mut state = self.inner.state.lock().await;
            state.pending.clear();
            state
                .entries
                .iter_mut()
                .filter_map(FileEntry::take_preview)
                .collect()
        };

        let released = handles.len();
        for handle in handles {
            self.inner.previews.release(handle);
        }
        info!(released, "Upload manager shut down");
    }

    fn emit_entries_changed(&self) {
        self.inner
            .events
            .emit(CoreEvent::Upload(UploadEvent::EntriesChanged))
            .ok();
    }

    fn spawn_drain_tick(&self) {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(manager.inner.config.drain_interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = manager.inner.shutdown.cancelled() => break,
                    _ = tick.tick() => manager.drain().await,
                }
            }
        });
    }
}
