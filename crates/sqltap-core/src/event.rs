//! The statement audit event.
//!
//! One [`StatementEvent`] describes one logical statement execution. The
//! JSON payload has a fixed key set — every key is serialized even when its
//! value is null, so downstream consumers never deal with a moving schema.
//!
//! For a batched execution of N parameter sets, exactly N events are
//! produced; per-row timing inside one batched driver call is not
//! observable, so duration, update count, and server info ride only on the
//! final record.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Transaction isolation level, encoded on the wire as its bit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IsolationLevel {
    /// `READ UNCOMMITTED` (code 1)
    ReadUncommitted,
    /// `READ COMMITTED` (code 2)
    ReadCommitted,
    /// `REPEATABLE READ` (code 4)
    RepeatableRead,
    /// `SERIALIZABLE` (code 8)
    Serializable,
}

impl IsolationLevel {
    /// Wire code: 1, 2, 4, or 8.
    pub fn code(self) -> u8 {
        match self {
            Self::ReadUncommitted => 1,
            Self::ReadCommitted => 2,
            Self::RepeatableRead => 4,
            Self::Serializable => 8,
        }
    }

    /// Inverse of [`code`](Self::code).
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::ReadUncommitted),
            2 => Some(Self::ReadCommitted),
            4 => Some(Self::RepeatableRead),
            8 => Some(Self::Serializable),
            _ => None,
        }
    }

    /// Parse a server-reported level such as `REPEATABLE-READ`,
    /// `repeatable read`, or `READ_COMMITTED`.
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value
            .trim()
            .to_ascii_uppercase()
            .replace(['-', '_'], " ");
        match normalized.as_str() {
            "READ UNCOMMITTED" => Some(Self::ReadUncommitted),
            "READ COMMITTED" => Some(Self::ReadCommitted),
            "REPEATABLE READ" => Some(Self::RepeatableRead),
            "SERIALIZABLE" => Some(Self::Serializable),
            _ => None,
        }
    }
}

impl Serialize for IsolationLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for IsolationLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u8::deserialize(deserializer)?;
        Self::from_code(code)
            .ok_or_else(|| D::Error::custom(format!("invalid isolation level code: {code}")))
    }
}

/// Immutable record of one logical statement execution.
///
/// The per-connection `execution_count` is strictly increasing; events from
/// one connection reach the sink in execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementEvent {
    /// Wall-clock start of the call, epoch milliseconds.
    pub timestamp: i64,
    /// `host:port` of the server, when probed successfully.
    pub server_host: Option<String>,
    /// Server version string.
    pub server_version: Option<String>,
    /// Database user of the connection.
    pub user: Option<String>,
    /// Hostname of the client process.
    pub client: Option<String>,
    /// Database selected at connect time. Never changes.
    pub db_name: Option<String>,
    /// Database tracked across `USE` statements.
    pub stmt_db_name: Option<String>,
    /// Inline-debug tag in effect.
    pub debug: Option<String>,
    /// Server-side connection id.
    pub connection_id: Option<u64>,
    /// Process-wide open-session count at capture time.
    pub total_pool_count: Option<u64>,
    /// Per-connection execution sequence number.
    pub execution_count: Option<u64>,
    /// Call duration in nanoseconds; set on the last record of a batch.
    pub duration_ns: Option<u64>,
    /// Server status flags at capture time.
    pub server_flags: Option<u32>,
    /// Client capability flags negotiated at connect time.
    pub client_flags: Option<u32>,
    /// Protocol/driver-origin and probe-failure bitmask. Always present.
    pub i_flags: u32,
    /// Client-local timezone.
    #[serde(rename = "defaultTZ")]
    pub default_tz: Option<String>,
    /// Session timezone reported by the server.
    #[serde(rename = "serverTZ")]
    pub server_tz: Option<String>,
    /// Session isolation level.
    pub isolation_lvl: Option<IsolationLevel>,
    /// Affected-row count; aggregate on the last record of a batch.
    pub update_count: Option<i64>,
    /// Statement text, when payload inclusion is enabled.
    pub sql: Option<String>,
    /// Redacted display strings, one per parameter.
    pub query_params: Option<Vec<String>>,
    /// Driver error message when the call failed.
    pub error_message: Option<String>,
    /// Server diagnostic string extracted after the call, best-effort.
    pub server_info: Option<String>,
}

impl StatementEvent {
    /// Serialize as a single compact JSON line.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
