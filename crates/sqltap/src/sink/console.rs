//! Console sink: one JSON line per event on stdout.

use crate::error::Result;
use crate::publish::EventPublisher;
use async_trait::async_trait;
use sqltap_core::StatementEvent;

/// Writes each event as one JSON line to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink {
    pretty: bool,
}

impl ConsoleSink {
    /// Compact one-line output.
    pub fn new() -> Self {
        Self { pretty: false }
    }

    /// Indented multi-line output, for humans.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

#[async_trait]
impl EventPublisher for ConsoleSink {
    async fn publish(&self, event: StatementEvent) -> Result<()> {
        let payload = if self.pretty {
            serde_json::to_string_pretty(&event)?
        } else {
            serde_json::to_string(&event)?
        };
        println!("{payload}");
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
