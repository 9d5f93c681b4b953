//! # sqltap
//!
//! Statement-level database audit capture: wraps a driver connection,
//! observes every statement execution, and ships structured events to a
//! console or Kafka sink — buffered per transaction and published through
//! an asynchronous batching queue under configurable backpressure.
//!
//! ## Architecture
//!
//! ```text
//! driver call
//!     │
//!     ▼
//! ┌──────────────────┐    classify + redact    ┌────────────────┐
//! │ CaptureSession / │ ──────────────────────▶ │ StatementEvent │
//! │  CaptureCursor   │                         └───────┬────────┘
//! └──────────────────┘                                 │
//!     │ commit: drain      ┌─────────────────────┐     │ buffer or
//!     ├───────────────────▶│  TransactionBuffer  │◀────┤ publish
//!     │ rollback: discard  └─────────────────────┘     │
//!     ▼                                                ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │   BatchingPublisher (bounded queue + worker, backpressure)   │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                ▼
//!                  ConsoleSink / KafkaSink / MemorySink
//! ```
//!
//! Interception is observational: driver errors are always re-raised, and
//! no failure originating in this crate reaches the instrumented call
//! path — telemetry failures degrade to flag bits and log lines.
//!
//! ## Feature flags
//!
//! - `kafka` — Kafka delivery via rskafka (pure Rust)
//! - `mysql` — MySQL/MariaDB adapter via mysql_async
//! - `full` — both of the above
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use sqltap::prelude::*;
//!
//! let settings = Settings::from_env();
//! let config = MysqlConnectConfig::new("db.internal", 3306)
//!     .with_user("app")
//!     .with_database("orders");
//!
//! let mut session = sqltap::connect_mysql(&config, settings).await?;
//! let mut cursor = session.cursor().await?;
//! cursor
//!     .execute(
//!         "INSERT INTO t (a) VALUES (?)",
//!         Some(&ParamValue::seq([ParamValue::Int(1)])),
//!     )
//!     .await?;
//! drop(cursor);
//! session.commit().await?;
//! session.close().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod buffer;
pub mod config;
pub mod connect;
pub mod driver;
pub mod error;
pub mod pool;
pub mod publish;
pub mod session;
pub mod sink;

#[cfg(feature = "mysql")]
pub mod mysql;

pub use buffer::TransactionBuffer;
pub use config::Settings;
pub use connect::build_publisher;
pub use driver::{Connection, Cursor, ProbeError, ProbeResult};
pub use error::{Result, TapError};
pub use publish::{Backpressure, BatchingPublisher, EventPublisher, PublisherConfig};
pub use session::{CaptureCursor, CaptureSession};

#[cfg(feature = "mysql")]
pub use connect::connect_mysql;
#[cfg(feature = "mysql")]
pub use mysql::{MysqlConnectConfig, MysqlConnection};

// Re-export the leaf types alongside the pipeline.
pub use sqltap_core::{
    classify, display_params, flags, parse_use_database, IsolationLevel, ParamValue,
    RedactionPolicy, StatementEvent, StatementKind,
};

/// Convenient imports for typical usage.
pub mod prelude {
    pub use crate::config::Settings;
    pub use crate::driver::{Connection, Cursor};
    pub use crate::publish::{Backpressure, BatchingPublisher, EventPublisher, PublisherConfig};
    pub use crate::session::{CaptureCursor, CaptureSession};
    pub use crate::sink::{ConsoleSink, MemorySink};
    pub use sqltap_core::{ParamValue, RedactionPolicy, StatementEvent};

    #[cfg(feature = "mysql")]
    pub use crate::mysql::MysqlConnectConfig;
}
