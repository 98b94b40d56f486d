//! Observer connection driver.
//!
//! Drives one long-lived observer connection from registration to
//! unregistration.
//!
//! ## State Machine
//!
//! ```text
//! Connecting ──► Registered ──► Idle ◄──► Delivering
//!                                 │            │
//!                                 ▼            ▼
//!                         Cancelled / Closed ──► Unregistered
//! ```
//!
//! The run loop waits on two sources at once: the next published event and an
//! explicit cancellation token. Event delivery to the sink also races the
//! token, so a peer that stops reading cannot pin the task. Whatever ends the
//! loop, the [`Subscription`] is dropped on the way out and the hub entry goes
//! with it.
//!
//! The event queue is deliberately lossy and is never used to detect
//! termination; only the token (or a closed sink) ends the connection.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::hub::{BroadcastHub, ObserverId, Subscription, TableEvent};

/// Lifecycle states of an observer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverState {
    /// Not yet known to the hub.
    Connecting,
    /// Registered, run loop not started.
    Registered,
    /// Waiting for the next event or cancellation.
    Idle,
    /// Writing an event to the sink.
    Delivering,
    /// Cancellation token fired.
    Cancelled,
    /// Sink or hub went away.
    Closed,
    /// Removed from the hub. Terminal.
    Unregistered,
}

/// Why an observer's run loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverExit {
    /// The cancellation token fired.
    Cancelled,
    /// The sink refused further events.
    SinkClosed,
    /// The hub dropped this observer.
    Evicted,
}

/// The sink refused an event because its reader is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("observer sink closed")]
pub struct SinkClosed;

/// Destination of an observer's events, typically a network stream.
#[async_trait]
pub trait EventSink: Send {
    /// Deliver one event. May wait for the reader.
    async fn deliver(&mut self, event: Arc<TableEvent>) -> Result<(), SinkClosed>;
}

#[async_trait]
impl EventSink for mpsc::Sender<Arc<TableEvent>> {
    async fn deliver(&mut self, event: Arc<TableEvent>) -> Result<(), SinkClosed> {
        self.send(event).await.map_err(|_| SinkClosed)
    }
}

/// One observer connection.
#[derive(Debug)]
pub struct Observer {
    subscription: Subscription,
    state: ObserverState,
}

impl Observer {
    /// Register with `hub`. Events published from this point on are offered
    /// to the observer.
    pub fn connect(hub: &BroadcastHub) -> Self {
        let mut state = ObserverState::Connecting;
        let subscription = hub.register();
        transition(subscription.id(), &mut state, ObserverState::Registered);
        Self { subscription, state }
    }

    /// Handle of this observer.
    pub fn id(&self) -> ObserverId {
        self.subscription.id()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ObserverState {
        self.state
    }

    /// Forward events to `sink` until `cancel` fires, the sink closes, or the
    /// hub evicts this observer. Unregisters before returning.
    pub async fn run<S>(mut self, mut sink: S, cancel: CancellationToken) -> ObserverExit
    where
        S: EventSink,
    {
        let id = self.id();
        transition(id, &mut self.state, ObserverState::Idle);

        let exit = loop {
            let event = tokio::select! {
                biased;
                () = cancel.cancelled() => break ObserverExit::Cancelled,
                event = self.subscription.recv() => event,
            };

            let Some(event) = event else {
                break ObserverExit::Evicted;
            };

            transition(id, &mut self.state, ObserverState::Delivering);
            let delivered = tokio::select! {
                biased;
                () = cancel.cancelled() => break ObserverExit::Cancelled,
                result = sink.deliver(event) => result,
            };

            if delivered.is_err() {
                break ObserverExit::SinkClosed;
            }
            transition(id, &mut self.state, ObserverState::Idle);
        };

        let end = match exit {
            ObserverExit::Cancelled => ObserverState::Cancelled,
            ObserverExit::SinkClosed | ObserverExit::Evicted => ObserverState::Closed,
        };
        transition(id, &mut self.state, end);

        drop(self.subscription);
        let mut state = end;
        transition(id, &mut state, ObserverState::Unregistered);

        exit
    }
}

fn transition(id: ObserverId, state: &mut ObserverState, next: ObserverState) {
    tracing::trace!(%id, from = ?*state, to = ?next, "observer state");
    *state = next;
}
