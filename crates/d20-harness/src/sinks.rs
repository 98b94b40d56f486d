//! Event sinks with scripted behavior for observer tests.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use d20_core::{EventSink, SinkClosed, TableEvent};
use tokio::sync::Notify;

/// Sink that records every delivered event.
///
/// Clones share the same record, so a test can keep one clone while the
/// observer task owns another.
#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<Arc<TableEvent>>>>,
    delivered: Arc<Notify>,
}

impl RecordingSink {
    /// Create an empty recording sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Events delivered so far, in order.
    pub fn events(&self) -> Vec<Arc<TableEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of events delivered so far.
    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if nothing has been delivered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until at least `count` events have been delivered.
    pub async fn wait_for(&self, count: usize) {
        loop {
            let notified = self.delivered.notified();
            if self.len() >= count {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn deliver(&mut self, event: Arc<TableEvent>) -> Result<(), SinkClosed> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event);
        self.delivered.notify_waiters();
        Ok(())
    }
}

/// Sink whose reader never reads: every delivery waits forever.
#[derive(Debug, Clone, Copy, Default)]
pub struct StalledSink;

#[async_trait]
impl EventSink for StalledSink {
    async fn deliver(&mut self, _event: Arc<TableEvent>) -> Result<(), SinkClosed> {
        std::future::pending().await
    }
}

/// Sink whose reader has already gone away.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClosedSink;

#[async_trait]
impl EventSink for ClosedSink {
    async fn deliver(&mut self, _event: Arc<TableEvent>) -> Result<(), SinkClosed> {
        Err(SinkClosed)
    }
}
