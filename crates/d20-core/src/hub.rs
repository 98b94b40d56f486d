//! Broadcast Hub
//!
//! Registry of live observer channels and the fan-out of table snapshots to
//! them.
//!
//! ## Responsibilities
//!
//! - Membership: hand out a [`Subscription`] per observer and remove it when
//!   the subscription is dropped or explicitly unregistered
//! - Rendering: turn the current table state into one payload per publish
//! - Fan-out: offer that identical payload to every registered channel
//!
//! ## Delivery
//!
//! Delivery is best-effort. Each observer owns a small bounded queue, and the
//! publisher only ever calls `try_send`. A queue that is full when a publish
//! happens simply misses that event. Payloads are whole-state snapshots, so
//! the next one the observer does receive brings it fully up to date.
//!
//! ## Locking
//!
//! Publishes share the registry read lock; register and unregister take the
//! write lock. The table lock is always released before the registry lock is
//! taken, and nothing under the registry lock awaits.

use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::{dice::Roll, table::TableState};

/// Default per-observer queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1;

/// Kind of state a published event carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Full roll history, most recent first.
    Roll,
    /// Full facilitator stats.
    Stats,
}

impl EventKind {
    /// Wire tag of this kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Roll => "ROLL",
            Self::Stats => "STATS",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rendered snapshot, shared by every observer that receives it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEvent {
    /// What the payload describes.
    pub kind: EventKind,
    /// Serialized whole-state body.
    pub data: String,
}

/// Rendering a snapshot failed.
#[derive(Debug, thiserror::Error)]
#[error("failed to render {kind} snapshot: {reason}")]
pub struct RenderError {
    /// Kind that was being rendered.
    pub kind: EventKind,
    /// Underlying failure.
    pub reason: String,
}

/// Turns table state into an event body.
pub trait SnapshotRenderer: Send + Sync + 'static {
    /// Render the current state of `kind` from `table`.
    fn render(&self, kind: EventKind, table: &TableState) -> Result<String, RenderError>;
}

/// Renders snapshots as JSON.
///
/// - `ROLL`: `{"history": [roll, ...]}`, most recent first
/// - `STATS`: the stats object
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

#[derive(Serialize)]
struct HistoryView<'a> {
    history: &'a [Roll],
}

impl SnapshotRenderer for JsonRenderer {
    fn render(&self, kind: EventKind, table: &TableState) -> Result<String, RenderError> {
        let rendered = match kind {
            EventKind::Roll => {
                let history = table.sorted_rolls();
                serde_json::to_string(&HistoryView { history: &history })
            },
            EventKind::Stats => serde_json::to_string(&table.stats()),
        };
        rendered.map_err(|e| RenderError { kind, reason: e.to_string() })
    }
}

/// Opaque handle of a registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer-{}", self.0)
    }
}

/// Outcome of one publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Whether a payload was produced at all.
    pub rendered: bool,
    /// Observers whose queue accepted the payload.
    pub delivered: usize,
    /// Observers whose queue was full or closing.
    pub skipped: usize,
}

/// Hub configuration.
#[derive(Debug, Clone, Copy)]
pub struct HubConfig {
    /// Per-observer queue capacity (values below 1 are raised to 1).
    pub queue_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self { queue_capacity: DEFAULT_QUEUE_CAPACITY }
    }
}

type EventSender = mpsc::Sender<Arc<TableEvent>>;

struct HubInner {
    observers: RwLock<HashMap<ObserverId, EventSender>>,
    next_id: AtomicU64,
    queue_capacity: usize,
    renderer: Box<dyn SnapshotRenderer>,
}

/// Fans table snapshots out to registered observers. Cheap to clone.
#[derive(Clone)]
pub struct BroadcastHub {
    inner: Arc<HubInner>,
}

impl BroadcastHub {
    /// Create a hub with default configuration and JSON rendering.
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    /// Create a hub with JSON rendering.
    pub fn with_config(config: HubConfig) -> Self {
        Self::with_renderer(config, JsonRenderer)
    }

    /// Create a hub with a custom renderer.
    pub fn with_renderer(config: HubConfig, renderer: impl SnapshotRenderer) -> Self {
        Self {
            inner: Arc::new(HubInner {
                observers: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                queue_capacity: config.queue_capacity.max(1),
                renderer: Box::new(renderer),
            }),
        }
    }

    /// Register a new observer.
    ///
    /// The returned subscription unregisters itself when dropped.
    pub fn register(&self) -> Subscription {
        let id = ObserverId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel(self.inner.queue_capacity);

        self.inner.observers.write().unwrap_or_else(PoisonError::into_inner).insert(id, sender);
        tracing::debug!(%id, "observer registered");

        Subscription { id, receiver, hub: self.clone() }
    }

    /// Remove an observer. Returns false if it was not registered.
    ///
    /// Safe to call while a publish is in flight and more than once for the
    /// same handle.
    pub fn unregister(&self, id: ObserverId) -> bool {
        let removed = self
            .inner
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some();

        if removed {
            tracing::debug!(%id, "observer unregistered");
        }
        removed
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.inner.observers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Render the current `kind` state of `table` and offer it to every
    /// observer.
    ///
    /// A render failure is logged and nothing is sent; the hub stays usable.
    pub fn publish(&self, kind: EventKind, table: &TableState) -> PublishReport {
        match self.inner.renderer.render(kind, table) {
            Ok(data) => self.deliver(TableEvent { kind, data }),
            Err(e) => {
                tracing::error!(%kind, "dropping publish: {}", e);
                PublishReport::default()
            },
        }
    }

    /// Offer an already rendered event to every observer without blocking.
    pub fn deliver(&self, event: TableEvent) -> PublishReport {
        let kind = event.kind;
        let event = Arc::new(event);
        let mut report = PublishReport { rendered: true, ..PublishReport::default() };

        let observers = self.inner.observers.read().unwrap_or_else(PoisonError::into_inner);
        for sender in observers.values() {
            match sender.try_send(Arc::clone(&event)) {
                Ok(()) => report.delivered += 1,
                // Closed means the subscription is mid-drop and about to
                // unregister itself.
                Err(TrySendError::Full(_) | TrySendError::Closed(_)) => report.skipped += 1,
            }
        }
        drop(observers);

        tracing::debug!(%kind, delivered = report.delivered, skipped = report.skipped, "published");
        report
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("observers", &self.observer_count())
            .field("queue_capacity", &self.inner.queue_capacity)
            .finish()
    }
}

/// A registered observer's receiving end.
///
/// Unregisters from the hub on drop, whichever way the owning task exits.
pub struct Subscription {
    id: ObserverId,
    receiver: mpsc::Receiver<Arc<TableEvent>>,
    hub: BroadcastHub,
}

impl Subscription {
    /// Handle of this observer.
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the observer has been unregistered and its queue
    /// drained.
    pub async fn recv(&mut self) -> Option<Arc<TableEvent>> {
        self.receiver.recv().await
    }

    /// Take the next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<TableEvent>> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unregister(self.id);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish_non_exhaustive()
    }
}
