//! In-memory sink collecting events in arrival order.
//!
//! Used by the test suites and handy as a diagnostic tap. Batch hand-offs
//! are recorded separately so callers can assert on batching behavior, and
//! batch delivery can be made to fail to exercise fallback paths.

use crate::error::{Result, TapError};
use crate::publish::EventPublisher;
use async_trait::async_trait;
use parking_lot::Mutex;
use sqltap_core::StatementEvent;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Collects published events in order.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<StatementEvent>>,
    batch_sizes: Mutex<Vec<usize>>,
    flush_count: AtomicUsize,
    fail_batches: AtomicBool,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `publish_batch` calls fail (per-event `publish`
    /// keeps working), to exercise fallback delivery.
    pub fn fail_batches(&self, fail: bool) {
        self.fail_batches.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of all events received so far, in arrival order.
    pub fn events(&self) -> Vec<StatementEvent> {
        self.events.lock().clone()
    }

    /// Number of events received so far.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether no events were received.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Sizes of successful `publish_batch` hand-offs, in order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().clone()
    }

    /// Number of `flush` calls observed.
    pub fn flushes(&self) -> usize {
        self.flush_count.load(Ordering::SeqCst)
    }

    /// Take all received events, leaving the sink empty.
    pub fn take_events(&self) -> Vec<StatementEvent> {
        std::mem::take(&mut self.events.lock())
    }
}

#[async_trait]
impl EventPublisher for MemorySink {
    async fn publish(&self, event: StatementEvent) -> Result<()> {
        self.events.lock().push(event);
        Ok(())
    }

    async fn publish_batch(&self, events: Vec<StatementEvent>) -> Result<()> {
        if self.fail_batches.load(Ordering::SeqCst) {
            return Err(TapError::publisher("batch delivery disabled"));
        }
        self.batch_sizes.lock().push(events.len());
        self.events.lock().extend(events);
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.flush_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
