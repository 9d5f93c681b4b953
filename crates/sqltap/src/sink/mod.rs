//! Delivery sinks.
//!
//! Every sink implements [`EventPublisher`](crate::publish::EventPublisher)
//! and is best-effort: delivery failures are logged and never propagate
//! into the instrumented call path.

mod console;
mod memory;

#[cfg(feature = "kafka")]
mod kafka;

pub use console::ConsoleSink;
pub use memory::MemorySink;

#[cfg(feature = "kafka")]
pub use kafka::{CompressionCodec, KafkaSink, KafkaSinkConfig};
