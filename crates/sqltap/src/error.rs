//! Error types for the capture pipeline.
//!
//! Only [`TapError::Driver`] ever reaches the instrumented call path —
//! everything that originates inside the pipeline (probing, redaction,
//! publishing) degrades to flag bits or log lines instead.

use thiserror::Error;

/// Errors produced by the capture pipeline.
#[derive(Error, Debug)]
pub enum TapError {
    /// Error raised by the underlying database driver. Always re-raised
    /// to the caller after best-effort event emission.
    #[error("driver error: {0}")]
    Driver(String),

    /// The publisher could not accept or deliver an event.
    #[error("publisher error: {0}")]
    Publisher(String),

    /// The sink transport could not be initialized or reached.
    #[error("sink error: {0}")]
    Sink(String),

    /// Invalid or incomplete configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The publisher has shut down and no longer accepts events.
    #[error("publisher closed")]
    Closed,

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A bounded wait elapsed.
    #[error("timeout: {0}")]
    Timeout(String),
}

impl TapError {
    /// Create a new driver error.
    pub fn driver(msg: impl Into<String>) -> Self {
        Self::Driver(msg.into())
    }

    /// Create a new publisher error.
    pub fn publisher(msg: impl Into<String>) -> Self {
        Self::Publisher(msg.into())
    }

    /// Create a new sink error.
    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink(msg.into())
    }

    /// Create a new configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new timeout error.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Whether this error came from the database driver itself.
    pub fn is_driver(&self) -> bool {
        matches!(self, Self::Driver(_))
    }
}

/// Result type for capture-pipeline operations.
pub type Result<T> = std::result::Result<T, TapError>;
