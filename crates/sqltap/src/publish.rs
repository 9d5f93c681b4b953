//! Asynchronous batching publisher.
//!
//! [`BatchingPublisher`] decouples the instrumented call path from sink
//! delivery: producers enqueue events onto a bounded queue, one background
//! worker accumulates them into batches and forwards the batches to the
//! inner sink. A batch flushes when it reaches the configured size or when
//! the flush interval elapses since the last flush, whichever comes first.
//!
//! Backpressure on a full queue is a policy choice: `Block` suspends the
//! producer until space frees (coupling the instrumented call path to
//! delivery throughput, deliberately); `Drop` discards the event and
//! returns immediately. Worker delivery failures are logged and the batch
//! is dropped — liveness over completeness.

use crate::error::{Result, TapError};
use async_trait::async_trait;
use sqltap_core::StatementEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, warn};

/// Downstream delivery capability. Implemented by sinks and by
/// [`BatchingPublisher`] itself, so capture sessions are indifferent to
/// whether a queue sits in between.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Hand one event to the publisher.
    async fn publish(&self, event: StatementEvent) -> Result<()>;

    /// Hand an ordered sequence of events to the publisher. Order is
    /// preserved; the default forwards element by element.
    async fn publish_batch(&self, events: Vec<StatementEvent>) -> Result<()> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }

    /// Block until previously handed-off events have reached the
    /// underlying transport.
    async fn flush(&self) -> Result<()>;

    /// Release transport resources. The publisher must not be used
    /// afterwards.
    async fn close(&self) -> Result<()>;
}

/// Producer behavior when the publish queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backpressure {
    /// Suspend the producer until queue space frees.
    #[default]
    Block,
    /// Discard the event and return immediately.
    Drop,
}

impl std::str::FromStr for Backpressure {
    type Err = TapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "block" => Ok(Self::Block),
            "drop" => Ok(Self::Drop),
            other => Err(TapError::config(format!(
                "invalid backpressure mode: {other:?} (expected \"block\" or \"drop\")"
            ))),
        }
    }
}

/// Configuration for [`BatchingPublisher`].
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Maximum queued events before backpressure applies.
    pub queue_max: usize,
    /// Batch size that triggers an immediate flush.
    pub batch_size: usize,
    /// Maximum time between flushes of a non-empty batch.
    pub flush_interval: Duration,
    /// Behavior on a full queue.
    pub backpressure: Backpressure,
    /// Bound on waiting for the worker to stop during close.
    pub close_timeout: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            queue_max: 10_000,
            batch_size: 500,
            flush_interval: Duration::from_millis(500),
            backpressure: Backpressure::Block,
            close_timeout: Duration::from_secs(2),
        }
    }
}

/// Bounded queue plus one background worker batching events to an inner
/// sink.
pub struct BatchingPublisher {
    inner: Arc<dyn EventPublisher>,
    tx: mpsc::Sender<StatementEvent>,
    shutdown_tx: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    backpressure: Backpressure,
    close_timeout: Duration,
}

impl BatchingPublisher {
    /// Start a publisher over `inner`. Spawns the worker task; must be
    /// called inside a tokio runtime.
    pub fn new(inner: Arc<dyn EventPublisher>, config: PublisherConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_max.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let worker = tokio::spawn(run_worker(
            rx,
            Arc::clone(&inner),
            config.batch_size.max(1),
            config.flush_interval,
            shutdown_rx,
        ));

        Self {
            inner,
            tx,
            shutdown_tx,
            worker: Mutex::new(Some(worker)),
            backpressure: config.backpressure,
            close_timeout: config.close_timeout,
        }
    }

    /// Whether the queue currently holds no events.
    fn queue_is_empty(&self) -> bool {
        self.tx.capacity() == self.tx.max_capacity()
    }

    async fn enqueue(&self, event: StatementEvent) -> Result<()> {
        match self.backpressure {
            Backpressure::Block => self
                .tx
                .send(event)
                .await
                .map_err(|_| TapError::Closed),
            Backpressure::Drop => match self.tx.try_send(event) {
                Ok(()) => Ok(()),
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!("publish queue full, dropping event");
                    Ok(())
                }
                Err(mpsc::error::TrySendError::Closed(_)) => Err(TapError::Closed),
            },
        }
    }
}

#[async_trait]
impl EventPublisher for BatchingPublisher {
    async fn publish(&self, event: StatementEvent) -> Result<()> {
        self.enqueue(event).await
    }

    async fn publish_batch(&self, events: Vec<StatementEvent>) -> Result<()> {
        for event in events {
            self.enqueue(event).await?;
        }
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        while !self.queue_is_empty() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        self.inner.flush().await
    }

    async fn close(&self) -> Result<()> {
        let _ = self.shutdown_tx.send(true);

        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            if tokio::time::timeout(self.close_timeout, handle).await.is_err() {
                warn!("publisher worker did not stop within the close timeout");
            }
        }

        if let Err(e) = self.flush().await {
            debug!("flush during close failed: {e}");
        }
        self.inner.close().await
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<StatementEvent>,
    inner: Arc<dyn EventPublisher>,
    batch_size: usize,
    flush_interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut batch: Vec<StatementEvent> = Vec::with_capacity(batch_size);
    let mut last_flush = Instant::now();

    loop {
        let deadline = last_flush + flush_interval;
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            received = rx.recv() => match received {
                Some(event) => {
                    batch.push(event);
                    if batch.len() >= batch_size {
                        deliver(&*inner, &mut batch).await;
                        last_flush = Instant::now();
                    }
                }
                // all senders gone
                None => break,
            },
            _ = tokio::time::sleep_until(deadline) => {
                if !batch.is_empty() {
                    deliver(&*inner, &mut batch).await;
                }
                last_flush = Instant::now();
            }
        }
    }

    // Shutdown: drain whatever is still queued, then flush the final batch.
    while let Ok(event) = rx.try_recv() {
        batch.push(event);
        if batch.len() >= batch_size {
            deliver(&*inner, &mut batch).await;
        }
    }
    if !batch.is_empty() {
        deliver(&*inner, &mut batch).await;
    }
}

/// Forward one batch to the inner sink. Failures are logged and the batch
/// is dropped; the worker loop keeps running.
async fn deliver(inner: &dyn EventPublisher, batch: &mut Vec<StatementEvent>) {
    let events = std::mem::take(batch);
    let count = events.len();
    if let Err(e) = inner.publish_batch(events).await {
        error!("failed to deliver batch of {count} events: {e}");
    }
}
