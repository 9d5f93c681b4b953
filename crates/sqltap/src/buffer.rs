//! Per-connection transaction buffer.
//!
//! Events captured while a transaction is open are staged here in
//! execution order. Commit drains the buffer atomically into one batch;
//! rollback discards it without delivery.

use sqltap_core::StatementEvent;

/// Ordered staging list for events pending commit.
#[derive(Debug, Default)]
pub struct TransactionBuffer {
    events: Vec<StatementEvent>,
}

impl TransactionBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event, preserving execution order.
    pub fn push(&mut self, event: StatementEvent) {
        self.events.push(event);
    }

    /// Take all buffered events, leaving the buffer empty.
    pub fn drain(&mut self) -> Vec<StatementEvent> {
        std::mem::take(&mut self.events)
    }

    /// Discard all buffered events.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Number of buffered events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
