//! # Event Bus System
//!
//! Event-driven notification channel for the storefront core, built on
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The upload manager owns all per-file state; observers (the UI layer)
//! never reach into it. Instead, every state change is announced here as a
//! typed event and the observer re-reads a snapshot. The components are:
//!
//! - **Event types**: strongly-typed enums per domain
//! - **[`EventBus`]**: central broadcast channel for publishing events
//! - **[`EventStream`]**: consuming wrapper with filtering
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventBus, CoreEvent, UploadEvent};
//!
//! let bus = EventBus::new(100);
//! let mut sub = bus.subscribe();
//!
//! bus.emit(CoreEvent::Upload(UploadEvent::EntriesChanged)).ok();
//! ```
//!
//! ## Error Handling
//!
//! `tokio::sync::broadcast` yields two receive errors: `Lagged(n)` when a
//! slow subscriber missed `n` events (non-fatal; the coarse
//! `EntriesChanged` signal makes missed granular events recoverable by
//! re-reading the snapshot) and `Closed` when all senders are gone.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Upload pipeline events
    Upload(UploadEvent),
    /// Draft listing lifecycle events
    Draft(DraftEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Upload(e) => e.description(),
            CoreEvent::Draft(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Upload(UploadEvent::EntryFailed { .. }) => EventSeverity::Error,
            CoreEvent::Upload(UploadEvent::EntryCompleted { .. }) => EventSeverity::Info,
            CoreEvent::Draft(DraftEvent::Created { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Upload Events
// ============================================================================

/// Events emitted by the upload queue manager.
///
/// `EntriesChanged` is the coarse signal the UI binds to: it fires on every
/// mutation of the visible entry list. The granular variants exist for
/// logging and targeted reactions (e.g. toasting a failure).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum UploadEvent {
    /// The visible entry list changed (entry added, removed, or any status
    /// transition). Observers should re-read the manager snapshot.
    EntriesChanged,
    /// An entry was admitted into the pipeline and started uploading.
    EntryAdmitted {
        /// The admitted entry.
        entry_id: String,
    },
    /// An entry passed all pipeline stages.
    EntryCompleted {
        /// The completed entry.
        entry_id: String,
        /// Stored name confirmed by the backend.
        remote_name: String,
    },
    /// An entry failed a pipeline stage or exceeded a stage timeout.
    EntryFailed {
        /// The failed entry.
        entry_id: String,
        /// Human-readable failure cause.
        message: String,
    },
}

impl UploadEvent {
    fn description(&self) -> &str {
        match self {
            UploadEvent::EntriesChanged => "Upload entries changed",
            UploadEvent::EntryAdmitted { .. } => "Entry admitted to pipeline",
            UploadEvent::EntryCompleted { .. } => "Entry uploaded successfully",
            UploadEvent::EntryFailed { .. } => "Entry upload failed",
        }
    }
}

// ============================================================================
// Draft Events
// ============================================================================

/// Events related to the draft listing lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum DraftEvent {
    /// The draft listing was created on the server.
    Created {
        /// Server-assigned draft identifier.
        draft_id: String,
    },
}

impl DraftEvent {
    fn description(&self) -> &str {
        match self {
            DraftEvent::Created { .. } => "Draft listing created",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Uses `tokio::sync::broadcast` internally: multiple producers (clone the
/// bus), independent consumers (each `subscribe()` creates a receiver),
/// non-blocking sends, lagging detection for slow subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error when there are none. Emitters that don't care whether anyone
    /// is listening call `.ok()` on the result.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Each call creates an independent receiver that observes all future
    /// events; past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with filtering.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{EventBus, EventStream, CoreEvent};
///
/// let bus = EventBus::new(100);
/// let mut failures = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Upload(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Adds a filter function to this stream.
    ///
    /// Only events that match the filter are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n`
    /// events, `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching event is currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
