//! Integration tests for the upload queue manager.
//!
//! Every test runs on a paused tokio clock, so stage delays and timeouts
//! resolve deterministically in virtual time.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bridge_traits::api::{DraftId, ListingMediaApi, UploadGrant};
use bridge_traits::error::BridgeError;
use bridge_traits::preview::{PreviewHandle, PreviewId, PreviewStore};
use bytes::Bytes;
use core_runtime::events::{CoreEvent, DraftEvent, EventBus, UploadEvent};
use core_upload::{EntryStatus, RawFile, UploadConfig, UploadError, UploadManager};

// ============================================================================
// Scripted backend
// ============================================================================

/// Listing API whose behavior is scripted per call.
///
/// Files are identified by the first byte of their artifact (the tests
/// submit non-image payloads, so the preprocessor falls back to the
/// original bytes and the marker survives to `transfer`).
struct ScriptedApi {
    draft_calls: AtomicUsize,
    draft_failures: AtomicUsize,
    authorize_calls: AtomicUsize,
    hang_authorize: Mutex<HashSet<usize>>,
    fail_transfer: Mutex<HashSet<u8>>,
    transfer_delay: Duration,
    transfers_in_flight: AtomicUsize,
    transfer_peak: AtomicUsize,
    transfer_order: Mutex<Vec<u8>>,
}

impl ScriptedApi {
    fn new() -> Self {
        Self::with_transfer_delay(Duration::ZERO)
    }

    fn with_transfer_delay(transfer_delay: Duration) -> Self {
        Self {
            draft_calls: AtomicUsize::new(0),
            draft_failures: AtomicUsize::new(0),
            authorize_calls: AtomicUsize::new(0),
            hang_authorize: Mutex::new(HashSet::new()),
            fail_transfer: Mutex::new(HashSet::new()),
            transfer_delay,
            transfers_in_flight: AtomicUsize::new(0),
            transfer_peak: AtomicUsize::new(0),
            transfer_order: Mutex::new(Vec::new()),
        }
    }

    /// Reject the first `n` create_draft calls.
    fn fail_draft_times(&self, n: usize) {
        self.draft_failures.store(n, Ordering::SeqCst);
    }

    /// Never answer the authorize call with the given index.
    fn hang_authorize_call(&self, call: usize) {
        self.hang_authorize.lock().unwrap().insert(call);
    }

    /// Fail the transfer of the file with the given marker byte.
    fn fail_transfer_of(&self, marker: u8) {
        self.fail_transfer.lock().unwrap().insert(marker);
    }

    fn transfer_order(&self) -> Vec<u8> {
        self.transfer_order.lock().unwrap().clone()
    }
}

#[async_trait]
impl ListingMediaApi for ScriptedApi {
    async fn create_draft(&self) -> bridge_traits::error::Result<DraftId> {
        let call = self.draft_calls.fetch_add(1, Ordering::SeqCst);
        if call < self.draft_failures.load(Ordering::SeqCst) {
            return Err(BridgeError::Api("listing service unavailable".to_string()));
        }
        Ok(DraftId::new(format!("draft-{call}")))
    }

    async fn authorize_upload(&self) -> bridge_traits::error::Result<UploadGrant> {
        let call = self.authorize_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang_authorize.lock().unwrap().contains(&call) {
            std::future::pending::<()>().await;
        }
        Ok(UploadGrant {
            credential: format!("grant-{call}"),
            remote_name: format!("media/{call}"),
        })
    }

    async fn transfer(
        &self,
        artifact: Bytes,
        grant: &UploadGrant,
    ) -> bridge_traits::error::Result<String> {
        let marker = artifact.first().copied().unwrap_or(0);

        let running = self.transfers_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.transfer_peak.fetch_max(running, Ordering::SeqCst);
        tokio::time::sleep(self.transfer_delay).await;
        self.transfers_in_flight.fetch_sub(1, Ordering::SeqCst);

        self.transfer_order.lock().unwrap().push(marker);

        if self.fail_transfer.lock().unwrap().contains(&marker) {
            return Err(BridgeError::Network(
                "connection reset during transfer".to_string(),
            ));
        }
        Ok(grant.remote_name.clone())
    }

    async fn link_media(
        &self,
        _draft: &DraftId,
        _remote_names: &[String],
    ) -> bridge_traits::error::Result<()> {
        Ok(())
    }
}

/// Preview store that panics on a double release.
struct CountingPreviews {
    allocated: AtomicUsize,
    released: AtomicUsize,
    live: Mutex<HashSet<PreviewId>>,
}

impl CountingPreviews {
    fn new() -> Self {
        Self {
            allocated: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
            live: Mutex::new(HashSet::new()),
        }
    }

    fn allocated(&self) -> usize {
        self.allocated.load(Ordering::SeqCst)
    }

    fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl PreviewStore for CountingPreviews {
    fn allocate(&self, _bytes: &Bytes) -> PreviewHandle {
        self.allocated.fetch_add(1, Ordering::SeqCst);
        let id = PreviewId::new();
        self.live.lock().unwrap().insert(id);
        PreviewHandle::new(id)
    }

    fn release(&self, handle: PreviewHandle) {
        let was_live = self.live.lock().unwrap().remove(&handle.id());
        assert!(was_live, "preview released twice or never allocated");
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn raw(marker: u8) -> RawFile {
    RawFile::new(
        format!("photo-{marker}.jpg"),
        "image/jpeg",
        Bytes::from(vec![marker; 4]),
    )
}

fn manager_with(
    api: Arc<ScriptedApi>,
    previews: Arc<CountingPreviews>,
    config: UploadConfig,
) -> UploadManager {
    UploadManager::new(config, api, previews, EventBus::new(256))
}

/// Advance virtual time far past every stage delay and timeout, letting all
/// in-flight runs settle.
async fn run_to_quiescence() {
    tokio::time::sleep(Duration::from_secs(300)).await;
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_single_file_completes() {
    let api = Arc::new(ScriptedApi::new());
    let previews = Arc::new(CountingPreviews::new());
    let manager = manager_with(api.clone(), previews.clone(), UploadConfig::default());

    let ids = manager.submit(vec![raw(1)]).await.unwrap();
    assert_eq!(ids.len(), 1);
    run_to_quiescence().await;

    let entries = manager.entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, ids[0]);
    assert_eq!(entries[0].status, EntryStatus::Completed);
    assert_eq!(entries[0].progress, 100);
    assert_eq!(entries[0].remote_name.as_deref(), Some("media/0"));
    assert!(entries[0].preview.is_some());

    assert!(manager.all_completed().await);
    assert!(!manager.has_error().await);
    assert_eq!(manager.active_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_batch_submit_prepares_every_file_before_queueing() {
    let api = Arc::new(ScriptedApi::new());
    let previews = Arc::new(CountingPreviews::new());
    let manager = manager_with(api, previews.clone(), UploadConfig::default());

    let ids = manager.submit((1..=4).map(raw).collect()).await.unwrap();

    // The whole batch is prepared and visible by the time submit returns
    assert_eq!(previews.allocated(), 4);
    let entries = manager.entries().await;
    assert_eq!(entries.iter().map(|e| e.id).collect::<Vec<_>>(), ids);
    assert!(entries.iter().all(|e| e.preview.is_some()));

    run_to_quiescence().await;
    assert!(manager.all_completed().await);
}

#[tokio::test(start_paused = true)]
async fn test_at_most_three_transfers_run_concurrently() {
    let api = Arc::new(ScriptedApi::with_transfer_delay(Duration::from_secs(5)));
    let previews = Arc::new(CountingPreviews::new());
    let manager = manager_with(api.clone(), previews, UploadConfig::default());

    let files = (1..=5).map(raw).collect();
    manager.submit(files).await.unwrap();
    run_to_quiescence().await;

    assert_eq!(api.transfer_peak.load(Ordering::SeqCst), 3);
    // Every submitted file still made it through
    assert!(manager.all_completed().await);
    assert_eq!(manager.entries().await.len(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_admission_is_fifo() {
    let api = Arc::new(ScriptedApi::with_transfer_delay(Duration::from_secs(1)));
    let previews = Arc::new(CountingPreviews::new());
    let config = UploadConfig {
        max_concurrent_uploads: 1,
        ..UploadConfig::default()
    };
    let manager = manager_with(api.clone(), previews, config);

    manager.submit((1..=5).map(raw).collect()).await.unwrap();
    run_to_quiescence().await;

    assert_eq!(api.transfer_order(), vec![1, 2, 3, 4, 5]);
}

#[tokio::test(start_paused = true)]
async fn test_one_failure_does_not_affect_the_others() {
    let api = Arc::new(ScriptedApi::new());
    api.fail_transfer_of(2);
    let previews = Arc::new(CountingPreviews::new());
    let manager = manager_with(api, previews, UploadConfig::default());

    let ids = manager.submit((1..=3).map(raw).collect()).await.unwrap();
    run_to_quiescence().await;

    let entries = manager.entries().await;
    let failed = entries.iter().find(|e| e.id == ids[1]).unwrap();
    assert_eq!(failed.status, EntryStatus::Error);
    let message = failed.error_message.as_deref().unwrap();
    assert!(message.contains("Transfer stage failed"), "got: {message}");
    assert!(message.contains("connection reset"), "got: {message}");

    for id in [ids[0], ids[2]] {
        let entry = entries.iter().find(|e| e.id == id).unwrap();
        assert_eq!(entry.status, EntryStatus::Completed);
    }

    assert!(manager.has_error().await);
    assert!(!manager.all_completed().await);
    assert_eq!(manager.active_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_pending_entry_can_be_removed_before_admission() {
    let api = Arc::new(ScriptedApi::with_transfer_delay(Duration::from_secs(5)));
    let previews = Arc::new(CountingPreviews::new());
    let config = UploadConfig {
        max_concurrent_uploads: 1,
        ..UploadConfig::default()
    };
    let manager = manager_with(api.clone(), previews.clone(), config);

    let ids = manager.submit((1..=3).map(raw).collect()).await.unwrap();
    // File 1 is already in flight; file 2 is still pending
    manager.remove(ids[1]).await;
    run_to_quiescence().await;

    assert_eq!(api.transfer_order(), vec![1, 3]);
    assert_eq!(manager.entries().await.len(), 2);
    assert_eq!(previews.released(), 1);
    assert!(manager.all_completed().await);
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_removal_discards_the_settlement() {
    let api = Arc::new(ScriptedApi::with_transfer_delay(Duration::from_secs(5)));
    let previews = Arc::new(CountingPreviews::new());
    let manager = manager_with(api.clone(), previews.clone(), UploadConfig::default());
    let mut sub = manager.events().subscribe();

    let ids = manager.submit(vec![raw(1)]).await.unwrap();
    // The entry was admitted during submit; remove it mid-run
    manager.remove(ids[0]).await;
    run_to_quiescence().await;

    assert!(manager.entries().await.is_empty());
    // Preview of the removed entry came back exactly once
    assert_eq!(previews.released(), 1);
    // The backend run was not aborted
    assert_eq!(api.transfer_order(), vec![1]);

    // ...but its settlement was discarded, not announced
    while let Ok(event) = sub.try_recv() {
        assert!(
            !matches!(
                event,
                CoreEvent::Upload(UploadEvent::EntryCompleted { .. })
                    | CoreEvent::Upload(UploadEvent::EntryFailed { .. })
            ),
            "unexpected terminal event: {event:?}"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_draft_failure_creates_no_entries() {
    let api = Arc::new(ScriptedApi::new());
    api.fail_draft_times(1);
    let previews = Arc::new(CountingPreviews::new());
    let manager = manager_with(api.clone(), previews.clone(), UploadConfig::default());

    let err = manager.submit(vec![raw(1), raw(2)]).await.unwrap_err();
    assert!(matches!(err, UploadError::DraftInit(_)));
    assert!(manager.entries().await.is_empty());
    assert_eq!(previews.allocated(), 0);

    // The next submission retries draft creation and goes through
    manager.submit(vec![raw(1), raw(2)]).await.unwrap();
    run_to_quiescence().await;

    assert_eq!(api.draft_calls.load(Ordering::SeqCst), 2);
    assert!(manager.all_completed().await);
    assert_eq!(previews.allocated(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_hung_authorize_times_out_at_the_bound() {
    let api = Arc::new(ScriptedApi::new());
    api.hang_authorize_call(0);
    let previews = Arc::new(CountingPreviews::new());
    let manager = manager_with(api, previews, UploadConfig::default());
    let mut sub = manager.events().subscribe();

    let started = tokio::time::Instant::now();
    manager.submit(vec![raw(1), raw(2)]).await.unwrap();

    let message = loop {
        match sub.recv().await.unwrap() {
            CoreEvent::Upload(UploadEvent::EntryFailed { message, .. }) => break message,
            _ => {}
        }
    };

    assert_eq!(started.elapsed(), Duration::from_secs(15));
    assert!(
        message.contains("Authorize stage timed out after 15s"),
        "got: {message}"
    );

    run_to_quiescence().await;
    let entries = manager.entries().await;
    assert_eq!(
        entries
            .iter()
            .filter(|e| e.status == EntryStatus::Error)
            .count(),
        1
    );
    assert_eq!(
        entries
            .iter()
            .filter(|e| e.status == EntryStatus::Completed)
            .count(),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_submissions_share_one_draft() {
    let api = Arc::new(ScriptedApi::new());
    let previews = Arc::new(CountingPreviews::new());
    let manager = manager_with(api.clone(), previews, UploadConfig::default());

    let (a, b) = tokio::join!(manager.submit(vec![raw(1)]), manager.submit(vec![raw(2)]));
    a.unwrap();
    b.unwrap();
    run_to_quiescence().await;

    assert_eq!(api.draft_calls.load(Ordering::SeqCst), 1);
    assert_eq!(manager.entries().await.len(), 2);
    assert!(manager.all_completed().await);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_releases_every_preview() {
    let api = Arc::new(ScriptedApi::new());
    let previews = Arc::new(CountingPreviews::new());
    let manager = manager_with(api, previews.clone(), UploadConfig::default());

    manager.submit((1..=3).map(raw).collect()).await.unwrap();
    run_to_quiescence().await;
    assert!(manager.all_completed().await);

    // Completed entries keep their previews until teardown
    assert_eq!(previews.released(), 0);
    manager.shutdown().await;
    assert_eq!(previews.released(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_events_announce_the_lifecycle() {
    let api = Arc::new(ScriptedApi::new());
    let previews = Arc::new(CountingPreviews::new());
    let manager = manager_with(api, previews, UploadConfig::default());
    let mut sub = manager.events().subscribe();

    let ids = manager.submit(vec![raw(1)]).await.unwrap();
    run_to_quiescence().await;

    let mut saw_draft = false;
    let mut saw_changed = false;
    let mut saw_admitted = false;
    let mut saw_completed = false;
    while let Ok(event) = sub.try_recv() {
        match event {
            CoreEvent::Draft(DraftEvent::Created { .. }) => saw_draft = true,
            CoreEvent::Upload(UploadEvent::EntriesChanged) => saw_changed = true,
            CoreEvent::Upload(UploadEvent::EntryAdmitted { entry_id }) => {
                assert_eq!(entry_id, ids[0].to_string());
                saw_admitted = true;
            }
            CoreEvent::Upload(UploadEvent::EntryCompleted {
                entry_id,
                remote_name,
            }) => {
                assert_eq!(entry_id, ids[0].to_string());
                assert_eq!(remote_name, "media/0");
                saw_completed = true;
            }
            _ => {}
        }
    }
    assert!(saw_draft && saw_changed && saw_admitted && saw_completed);
}
