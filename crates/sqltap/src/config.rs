//! Capture and publishing settings.
//!
//! Settings are loaded once, at wiring time — from the environment via
//! [`Settings::from_env`] or built in code — and then handed to the
//! session by value. Nothing in the pipeline re-reads the environment.
//!
//! Environment variables use the `SQLTAP_` prefix; unparsable values fall
//! back to their defaults.

use crate::publish::{Backpressure, PublisherConfig};
use serde::{Deserialize, Serialize};
use sqltap_core::RedactionPolicy;
use std::time::Duration;

/// Static configuration for capture sessions and publishers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Kafka bootstrap servers, comma-separated. Unset means console
    /// delivery.
    pub kafka_bootstrap_servers: Option<String>,
    /// Kafka destination topic.
    pub kafka_topic: String,
    /// Kafka client id.
    pub kafka_client_id: String,
    /// SASL PLAIN username.
    pub kafka_username: Option<String>,
    /// SASL PLAIN password.
    pub kafka_password: Option<String>,
    /// Record batch compression codec name (`none`, `gzip`, `lz4`,
    /// `snappy`, `zstd`).
    pub kafka_compression: String,

    /// Stage captured events until commit instead of publishing
    /// immediately.
    pub buffer_until_commit: bool,
    /// Capture every statement, reads included.
    pub capture_all: bool,
    /// When `capture_all` is off: capture DDL statements.
    pub capture_ddl: bool,
    /// When `capture_all` is off: capture stored-procedure calls.
    pub capture_callproc: bool,

    /// Include statement text in event payloads.
    pub include_sql: bool,
    /// Include redacted parameter strings in event payloads.
    pub include_params: bool,

    /// Parameter redaction policy.
    pub redaction: RedactionPolicy,

    /// Put a batching queue in front of the sink.
    pub enable_queueing_publisher: bool,
    /// Maximum queued events before backpressure applies.
    pub publish_queue_max: usize,
    /// Batch size that triggers an immediate flush.
    pub publish_batch_size: usize,
    /// Maximum milliseconds between flushes of a non-empty batch.
    pub publish_flush_interval_ms: u64,
    /// Behavior on a full queue.
    pub backpressure: Backpressure,

    /// Prefix statements with a debug comment before delegation.
    pub inline_debug: bool,
    /// Tag carried in the debug comment and the event `debug` field;
    /// falls back to `service_name`.
    pub inline_debug_tag: Option<String>,
    /// Name of the instrumented service.
    pub service_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            kafka_bootstrap_servers: None,
            kafka_topic: "MYSQL_EVENTS".to_string(),
            kafka_client_id: "sqltap".to_string(),
            kafka_username: None,
            kafka_password: None,
            kafka_compression: "none".to_string(),

            buffer_until_commit: true,
            capture_all: true,
            capture_ddl: true,
            capture_callproc: true,

            include_sql: true,
            include_params: true,

            redaction: RedactionPolicy::default(),

            enable_queueing_publisher: false,
            publish_queue_max: 10_000,
            publish_batch_size: 500,
            publish_flush_interval_ms: 500,
            backpressure: Backpressure::Block,

            inline_debug: false,
            inline_debug_tag: None,
            service_name: "unknown-service".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from `SQLTAP_*` environment variables, falling back
    /// to defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let base = Self::default();
        Self {
            kafka_bootstrap_servers: env_opt("SQLTAP_KAFKA_BOOTSTRAP_SERVERS"),
            kafka_topic: env_str("SQLTAP_KAFKA_TOPIC", base.kafka_topic),
            kafka_client_id: env_str("SQLTAP_KAFKA_CLIENT_ID", base.kafka_client_id),
            kafka_username: env_opt("SQLTAP_KAFKA_USERNAME"),
            kafka_password: env_opt("SQLTAP_KAFKA_PASSWORD"),
            kafka_compression: env_str("SQLTAP_KAFKA_COMPRESSION", base.kafka_compression),

            buffer_until_commit: env_bool("SQLTAP_BUFFER_UNTIL_COMMIT", base.buffer_until_commit),
            capture_all: env_bool("SQLTAP_CAPTURE_ALL", base.capture_all),
            capture_ddl: env_bool("SQLTAP_CAPTURE_DDL", base.capture_ddl),
            capture_callproc: env_bool("SQLTAP_CAPTURE_CALLPROC", base.capture_callproc),

            include_sql: env_bool("SQLTAP_INCLUDE_SQL", base.include_sql),
            include_params: env_bool("SQLTAP_INCLUDE_PARAMS", base.include_params),

            redaction: RedactionPolicy {
                redact_keys: env_csv("SQLTAP_REDACT_KEYS", base.redaction.redact_keys),
                replacement: env_str("SQLTAP_REDACT_VALUE", base.redaction.replacement),
                max_param_len: env_usize("SQLTAP_MAX_PARAM_LENGTH", base.redaction.max_param_len),
            },

            enable_queueing_publisher: env_bool(
                "SQLTAP_ENABLE_QUEUEING_PUBLISHER",
                base.enable_queueing_publisher,
            ),
            publish_queue_max: env_usize("SQLTAP_PUBLISH_QUEUE_MAXSIZE", base.publish_queue_max),
            publish_batch_size: env_usize("SQLTAP_PUBLISH_BATCH_SIZE", base.publish_batch_size),
            publish_flush_interval_ms: env_u64(
                "SQLTAP_PUBLISH_FLUSH_INTERVAL_MS",
                base.publish_flush_interval_ms,
            ),
            backpressure: env_opt("SQLTAP_BACKPRESSURE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(base.backpressure),

            inline_debug: env_bool("SQLTAP_INLINE_DEBUG", base.inline_debug),
            inline_debug_tag: env_opt("SQLTAP_DEBUG"),
            service_name: env_str("SQLTAP_SERVICE_NAME", base.service_name),
        }
    }

    /// Flush interval as a [`Duration`].
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.publish_flush_interval_ms)
    }

    /// Derive the batching-publisher configuration.
    pub fn publisher_config(&self) -> PublisherConfig {
        PublisherConfig {
            queue_max: self.publish_queue_max,
            batch_size: self.publish_batch_size,
            flush_interval: self.flush_interval(),
            backpressure: self.backpressure,
            ..PublisherConfig::default()
        }
    }

    /// Toggle capture-everything mode.
    pub fn with_capture_all(mut self, capture_all: bool) -> Self {
        self.capture_all = capture_all;
        self
    }

    /// Toggle transactional buffering.
    pub fn with_buffer_until_commit(mut self, buffer: bool) -> Self {
        self.buffer_until_commit = buffer;
        self
    }

    /// Set the backpressure mode.
    pub fn with_backpressure(mut self, mode: Backpressure) -> Self {
        self.backpressure = mode;
        self
    }

    /// Toggle SQL text inclusion.
    pub fn with_include_sql(mut self, include: bool) -> Self {
        self.include_sql = include;
        self
    }

    /// Toggle parameter inclusion.
    pub fn with_include_params(mut self, include: bool) -> Self {
        self.include_params = include;
        self
    }

    /// Replace the redaction policy.
    pub fn with_redaction(mut self, redaction: RedactionPolicy) -> Self {
        self.redaction = redaction;
        self
    }

    /// Enable inline debug with the given tag.
    pub fn with_inline_debug(mut self, tag: impl Into<String>) -> Self {
        self.inline_debug = true;
        self.inline_debug_tag = Some(tag.into());
        self
    }
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_str(name: &str, default: String) -> String {
    env_opt(name).unwrap_or(default)
}

fn env_bool(name: &str, default: bool) -> bool {
    match env_opt(name) {
        Some(v) => matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "t" | "yes" | "y" | "on"
        ),
        None => default,
    }
}

fn env_usize(name: &str, default: usize) -> usize {
    env_opt(name)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env_opt(name)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_csv(name: &str, default: Vec<String>) -> Vec<String> {
    match env_opt(name) {
        Some(v) => v
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect(),
        None => default,
    }
}
