//! The driver capability consumed by the capture layer.
//!
//! A [`Connection`] is whatever the wrapped database client exposes:
//! cursor creation, transaction control, and a set of best-effort metadata
//! probes. The capture layer never talks to a driver any other way, so a
//! new database client is supported by implementing these two traits.
//!
//! Probes are explicit about their three outcomes: a value, no value, or a
//! failure with a reason. Failures map to `iFlags` bits; they never
//! propagate into the instrumented call path.

use crate::error::Result;
use async_trait::async_trait;
use sqltap_core::ParamValue;
use thiserror::Error;

/// Reason a best-effort metadata probe failed.
#[derive(Debug, Clone, Error)]
#[error("probe failed: {0}")]
pub struct ProbeError(pub String);

impl ProbeError {
    /// Create a probe failure with a reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Outcome of a best-effort probe: `Ok(Some(v))` value, `Ok(None)` no
/// value exposed by the driver, `Err` probe failure.
pub type ProbeResult<T> = std::result::Result<Option<T>, ProbeError>;

/// A statement cursor of the underlying driver.
#[async_trait]
pub trait Cursor: Send {
    /// Execute one statement with optional parameters.
    async fn execute(&mut self, sql: &str, params: Option<&ParamValue>) -> Result<()>;

    /// Execute one statement once per parameter set.
    async fn execute_many(&mut self, sql: &str, param_sets: &[ParamValue]) -> Result<()>;

    /// Call a stored procedure with optional parameters.
    async fn call_proc(&mut self, name: &str, params: Option<&ParamValue>) -> Result<()>;

    /// Affected/returned row count of the last call, when known.
    fn row_count(&self) -> Option<i64>;

    /// Server diagnostic string for the last call (e.g. MySQL's
    /// `Rows matched: ... Changed: ...`), best-effort.
    fn server_info(&self) -> ProbeResult<String>;

    /// Close the cursor.
    async fn close(&mut self) -> Result<()>;
}

/// A physical connection of the underlying driver.
#[async_trait]
pub trait Connection: Send {
    /// Cursor type produced by [`cursor`](Self::cursor).
    type Cursor: Cursor;

    /// Open a new statement cursor.
    async fn cursor(&mut self) -> Result<Self::Cursor>;

    /// Commit the open transaction.
    async fn commit(&mut self) -> Result<()>;

    /// Roll back the open transaction.
    async fn rollback(&mut self) -> Result<()>;

    /// Close the physical connection.
    async fn close(&mut self) -> Result<()>;

    /// Driver-origin marker bits folded into every event's flag mask.
    fn driver_flags(&self) -> u32;

    /// Connect-time username, when the driver exposes it.
    fn user(&self) -> Option<String> {
        None
    }

    /// Connect-time database name, when the driver exposes it.
    fn database(&self) -> Option<String> {
        None
    }

    /// `host:port` of the server.
    async fn server_host(&mut self) -> ProbeResult<String>;

    /// Server version string.
    async fn server_version(&mut self) -> ProbeResult<String>;

    /// Server-side connection id.
    async fn connection_id(&mut self) -> ProbeResult<u64>;

    /// Session timezone as reported by the server.
    async fn session_time_zone(&mut self) -> ProbeResult<String>;

    /// Session isolation level as reported by the server (raw string,
    /// e.g. `REPEATABLE-READ`).
    async fn isolation_level(&mut self) -> ProbeResult<String>;

    /// Client capability flags negotiated at connect time.
    async fn client_flags(&mut self) -> ProbeResult<u32>;

    /// Current server status flags. Re-probed per statement.
    async fn server_flags(&mut self) -> ProbeResult<u32>;
}
